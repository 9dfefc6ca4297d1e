//! Native side of the Clownfish object system.
//!
//! Every object starts with a [`CfObj`] header carrying an intrusive atomic
//! refcount. The exported `cfish_*` functions are the fixed binary contract a
//! host links against; a host owns objects only through credits on that
//! refcount. Functions that can throw, or that call back into the host, use
//! the `C-unwind` ABI so host unwinding can pass through them.
#![allow(clippy::missing_safety_doc)]

pub mod class;
pub mod collections;
mod err;
mod object;

use once_cell::sync::OnceCell;

pub use crate::class::{
    cfish_class_fetch_class, cfish_class_get_name, cfish_class_get_parent, fetch_class, CfClass,
    BYTEBUF, ERR, HASH, OBJ, STRING, VECTOR,
};
pub use crate::collections::bytebuf::{cfish_bb_get_buf, cfish_bb_get_size, cfish_bb_new, CfByteBuf};
pub use crate::collections::hash::{
    cfish_hash_delete_utf8, cfish_hash_fetch_retained_utf8, cfish_hash_fetch_utf8, cfish_hash_get_size, cfish_hash_new,
    cfish_hash_store_utf8, CfHash,
};
pub use crate::collections::string::{
    cfish_str_cat, cfish_str_equals, cfish_str_get_ptr8, cfish_str_get_size, cfish_str_new_from_trusted_utf8,
    cfish_str_new_from_utf8, cfish_str_new_steal_trusted_utf8, cfish_str_new_steal_utf8, new_string, CfString,
};
pub use crate::collections::vector::{
    cfish_vec_fetch, cfish_vec_for_each, cfish_vec_get_size, cfish_vec_new, cfish_vec_push, CfVector, VisitFn,
};
pub use crate::err::{
    cfish_callbacks_installed, cfish_err_do_throw, cfish_err_get_mess, cfish_err_new, cfish_err_throw_mess, cfish_err_trap, cfish_install_callbacks, throw, AttemptFn, CallbackSlots, CfErr, DoThrowFn, TrapContext, TrapFn,
};
pub use crate::object::{
    cfish_dec_refcount, cfish_get_refcount, cfish_inc_refcount, cfish_obj_get_class, cfish_obj_is_a,
    cfish_obj_to_string, CfObj, NativeKind,
};

static PARCEL: OnceCell<()> = OnceCell::new();

/// FFI: Bootstraps the parcel: registers the core classes. Idempotent; must
/// run before the host constructs any object.
#[no_mangle]
pub extern "C" fn cfish_bootstrap_parcel() {
    PARCEL.get_or_init(|| {
        for klass in class::CORE_CLASSES {
            if !class::register(klass) {
                log::warn!("class {} was already registered", klass.name());
            }
        }
        log::debug!("clownfish parcel bootstrapped ({} core classes)", class::CORE_CLASSES.len());
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_registers_core_classes() {
        cfish_bootstrap_parcel();
        cfish_bootstrap_parcel();
        let name = "Clownfish::String";
        let klass = unsafe { cfish_class_fetch_class(name.as_ptr(), name.len()) };
        assert!(std::ptr::eq(klass, &STRING));
        assert!(fetch_class("Clownfish::Nope").is_none());
        assert!(STRING.is_subclass_of(&OBJ));
        assert!(!OBJ.is_subclass_of(&STRING));
        assert!(std::ptr::eq(unsafe { cfish_class_get_parent(&ERR) }, &OBJ));
    }

    #[test]
    fn last_release_destroys() {
        unsafe {
            let bb = cfish_bb_new(b"xyz".as_ptr(), 3);
            assert_eq!(cfish_get_refcount(bb.cast()), 1);
            cfish_inc_refcount(bb.cast());
            assert_eq!(cfish_dec_refcount(bb.cast()), 1);
            assert!(cfish_obj_is_a(bb.cast(), &BYTEBUF));
            assert!(!cfish_obj_is_a(bb.cast(), &STRING));
            assert_eq!(cfish_dec_refcount(bb.cast()), 0);
        }
    }
}
