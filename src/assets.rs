//! Texture loading. A load returns an [`AssetHandle`] straight away; the frame
//! loop polls it and installs the image once it resolves.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{DriveError, Result};

enum AssetState<T> {
    Pending,
    Done(Result<T>),
    Taken,
}

/// Pollable result of an asynchronous load. The value is handed out once.
pub struct AssetHandle<T> {
    url: String,
    state: Rc<RefCell<AssetState<T>>>,
}

/// Completes the matching [`AssetHandle`]
pub struct AssetResolver<T> {
    state: Rc<RefCell<AssetState<T>>>,
}

impl<T> AssetHandle<T> {
    pub fn pending(url: impl Into<String>) -> (Self, AssetResolver<T>) {
        let state = Rc::new(RefCell::new(AssetState::Pending));
        let handle = Self {
            url: url.into(),
            state: state.clone(),
        };
        (handle, AssetResolver { state })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_pending(&self) -> bool {
        matches!(*self.state.borrow(), AssetState::Pending)
    }

    /// `Some` exactly once, when the load has finished
    pub fn poll(&self) -> Option<Result<T>> {
        let mut state = self.state.borrow_mut();
        if !matches!(*state, AssetState::Done(_)) {
            return None;
        }
        match std::mem::replace(&mut *state, AssetState::Taken) {
            AssetState::Done(result) => Some(result),
            _ => None,
        }
    }
}

impl<T> AssetResolver<T> {
    pub fn resolve(self, result: Result<T>) {
        *self.state.borrow_mut() = AssetState::Done(result);
    }
}

pub fn decode_image(url: &str, bytes: &[u8]) -> Result<image::RgbaImage> {
    let img = image::load_from_memory(bytes).map_err(|e| DriveError::asset(url, e))?;
    Ok(img.to_rgba8())
}

#[cfg(target_arch = "wasm32")]
async fn fetch_bytes(url: &str) -> Result<Vec<u8>> {
    use wasm_bindgen::JsCast;
    use wasm_bindgen_futures::JsFuture;

    let window = web_sys::window().ok_or_else(|| DriveError::Js("no window".to_string()))?;
    let response = JsFuture::from(window.fetch_with_str(url)).await?;
    let response: web_sys::Response = response.dyn_into()?;
    if !response.ok() {
        return Err(DriveError::asset(url, format!("HTTP {}", response.status())));
    }
    let buffer = JsFuture::from(response.array_buffer()?).await?;
    Ok(js_sys::Uint8Array::new(&buffer).to_vec())
}

/// Start loading an image. In the browser the fetch runs in the background.
#[cfg(target_arch = "wasm32")]
pub fn load_image(url: &str) -> AssetHandle<image::RgbaImage> {
    let (handle, resolver) = AssetHandle::pending(url);
    let url = url.to_string();
    wasm_bindgen_futures::spawn_local(async move {
        let result = match fetch_bytes(&url).await {
            Ok(bytes) => decode_image(&url, &bytes),
            Err(e) => Err(e),
        };
        resolver.resolve(result);
    });
    handle
}

/// Start loading an image. Natively the file is read right away.
#[cfg(not(target_arch = "wasm32"))]
pub fn load_image(path: &str) -> AssetHandle<image::RgbaImage> {
    let (handle, resolver) = AssetHandle::pending(path);
    let result = std::fs::read(path)
        .map_err(|source| DriveError::Io {
            path: path.into(),
            source,
        })
        .and_then(|bytes| decode_image(path, &bytes));
    resolver.resolve(result);
    handle
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_yields_once() {
        let (handle, resolver) = AssetHandle::<u32>::pending("textures/grass.png");
        assert!(handle.is_pending());
        assert!(handle.poll().is_none());

        resolver.resolve(Ok(7));
        assert!(!handle.is_pending());
        assert_eq!(handle.poll().unwrap().unwrap(), 7);
        assert!(handle.poll().is_none(), "value must only be handed out once");
    }

    #[test]
    fn test_failed_load_reports_error() {
        let (handle, resolver) = AssetHandle::<u32>::pending("textures/wheel.png");
        resolver.resolve(Err(DriveError::asset("textures/wheel.png", "404")));
        let err = handle.poll().unwrap().unwrap_err();
        assert!(err.to_string().contains("textures/wheel.png"));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode_image("bad.png", b"not an image").unwrap_err();
        assert!(matches!(err, DriveError::Asset { .. }));
    }

    #[test]
    fn test_decode_png() {
        let img = image::RgbaImage::from_pixel(2, 3, image::Rgba([10, 20, 30, 255]));
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        let decoded = decode_image("mem.png", &bytes).unwrap();
        assert_eq!(decoded.dimensions(), (2, 3));
        assert_eq!(decoded.get_pixel(1, 2), &image::Rgba([10, 20, 30, 255]));
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn test_missing_file_is_io_error() {
        let handle = load_image("does/not/exist.png");
        let err = handle.poll().unwrap().unwrap_err();
        assert!(matches!(err, DriveError::Io { .. }));
    }
}
