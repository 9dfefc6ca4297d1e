mod common;

use clownfish::sys::{cfish_err_new, cfish_obj_to_string, cfish_str_get_size};
use clownfish::{from_host_text, to_host_text, CfString, Handle, NativeError};
use proptest::prelude::*;

#[test]
fn test_multibyte_text_round_trips() {
    common::setup();
    let handle = from_host_text("héllo");
    assert_eq!(unsafe { cfish_str_get_size(handle.as_ptr()) }, 6);
    assert_eq!(handle.to_host_text(), "héllo");
}

#[test]
fn test_null_object_is_empty_text() {
    common::setup();
    assert_eq!(unsafe { to_host_text(std::ptr::null_mut()) }, "");
}

#[test]
fn test_non_string_objects_are_converted() {
    common::setup();
    let err = NativeError::new("converted");
    assert_eq!(err.handle().to_host_text(), "converted");

    let raw = unsafe { cfish_err_new(from_host_text("direct").into_raw()) };
    let err = unsafe { NativeError::from_raw(raw) }.unwrap();
    let text = unsafe { cfish_obj_to_string(err.handle().as_obj_ptr()) };
    let text = unsafe { Handle::<CfString>::from_raw(text) }.unwrap();
    assert_eq!(text.to_host_text(), "direct");
    // The conversion handed out its own credit on the message.
    assert_eq!(text.refcount(), 2);
    drop(err);
    assert_eq!(text.refcount(), 1);
    assert_eq!(text.to_host_text(), "direct");
}

#[test]
fn test_released_handle_reads_empty() {
    common::setup();
    let mut handle = Handle::<CfString>::from("short lived");
    handle.release();
    assert_eq!(handle.to_host_text(), "");
    assert!(handle.is_empty());
}

proptest! {
    #[test]
    fn prop_host_text_survives_the_native_side(text in ".*") {
        common::setup();
        let handle = from_host_text(text.clone());
        prop_assert_eq!(handle.len(), text.len());
        prop_assert_eq!(handle.to_host_text(), text);
    }
}
