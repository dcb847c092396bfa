//! Cross-module properties of marshaling, handle resolution and the codec

use pyospray_core::framebuffer::{to_bytes, to_file, PixelFormat, PixelRegion};
use pyospray_core::handle::{resolve_handles, Exposed, HandleRef};
use pyospray_core::marshal::{marshal_code, marshal_numeric, NumericSource, Source};
use pyospray_core::types::{resolve, StorageKind};
use pyospray_core::{Error, RawHandle, TypeTag};

/// Wrapper that may or may not carry a handle, like a host-side object
struct SceneObject(Option<usize>);

impl HandleRef for SceneObject {
    fn expose_handle(&self) -> Exposed {
        match self.0 {
            Some(addr) => Exposed::Handle(RawHandle::from_addr(addr)),
            None => Exposed::Missing,
        }
    }
}

#[test]
fn test_element_count_and_byte_length() {
    for tag in TypeTag::all() {
        let spec = resolve(tag).unwrap();
        if spec.storage == StorageKind::ObjectHandle {
            continue;
        }
        for elements in [0usize, 1, 5] {
            let raw_len = elements * spec.components;
            let floats = vec![0.5f32; raw_len];
            let ints = vec![7i32; raw_len];
            let source = match spec.storage {
                StorageKind::Float32 => NumericSource::from_f32(&floats),
                _ => NumericSource::from_i32(&ints),
            };

            let buffer = marshal_numeric(tag, source).unwrap();
            assert_eq!(buffer.element_count(), elements, "{}", tag);
            assert_eq!(
                buffer.byte_len(),
                buffer.element_count() * spec.components * spec.storage.size_bytes(),
                "{}",
                tag
            );
        }
    }
}

#[test]
fn test_misaligned_vec3() {
    let data = [1.0f32; 10];
    let result = marshal_numeric(TypeTag::Float3, NumericSource::from_f32(&data));
    assert!(matches!(
        result,
        Err(Error::MisalignedLength { len: 10, components: 3 })
    ));
}

#[test]
fn test_resolver_order_and_missing_index() {
    let objects: Vec<SceneObject> = (1..=5).map(|i| SceneObject(Some(i * 0x10))).collect();
    let handles = resolve_handles(&objects).unwrap();
    assert_eq!(handles.len(), 5);
    let addrs: Vec<usize> = handles.iter().map(|h| h.addr()).collect();
    assert_eq!(addrs, vec![0x10, 0x20, 0x30, 0x40, 0x50]);

    let mut objects = objects;
    objects[3] = SceneObject(None);
    assert!(matches!(
        resolve_handles(&objects),
        Err(Error::MissingHandleCapability { index: 3 })
    ));
}

#[test]
fn test_codec_2x2() {
    let pixels: Vec<u8> = (1..=16).collect();
    let region = PixelRegion::new(2, 2, &pixels).unwrap();

    let rgba = to_bytes(&region, PixelFormat::Rgba);
    assert_eq!(rgba.len(), 16);
    assert_eq!(&rgba[..8], &pixels[8..]);
    assert_eq!(&rgba[8..], &pixels[..8]);

    let rgb = to_bytes(&region, PixelFormat::Rgb);
    assert_eq!(rgb.len(), 12);
    assert!(rgb.iter().all(|b| b % 4 != 0), "alpha bytes leaked: {:?}", rgb);
}

#[test]
fn test_ppm_file_layout() -> anyhow::Result<()> {
    let pixels: Vec<u8> = (1..=16).collect();
    let region = PixelRegion::new(2, 2, &pixels)?;
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("frame.ppm");

    to_file(&path, &region)?;

    let bytes = std::fs::read(&path)?;
    let header = b"P6\n2 2\n255\n";
    assert_eq!(&bytes[..header.len()], header);
    assert_eq!(
        &bytes[header.len()..header.len() + 12],
        &to_bytes(&region, PixelFormat::Rgb)[..]
    );
    assert_eq!(&bytes[header.len() + 12..], b"\n");
    Ok(())
}

#[test]
fn test_unsupported_code() {
    let data = [0.0f32; 4];
    // OSP_DOUBLE is not in the table
    let result = marshal_code::<RawHandle>(7000, Source::Numeric(NumericSource::from_f32(&data)));
    assert!(matches!(result, Err(Error::UnsupportedTypeKind(_))));
    assert!(TypeTag::try_from(0u32).is_err());
}
