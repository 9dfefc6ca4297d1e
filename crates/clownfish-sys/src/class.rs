use std::ptr;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::collections::bytebuf::{bb_to_string, CfByteBuf};
use crate::collections::hash::CfHash;
use crate::collections::string::{new_string, str_to_string, CfString};
use crate::collections::vector::{vec_to_string, CfVector};
use crate::err::{err_to_string, CfErr};
use crate::object::{destroy, obj_to_string, CfObj};

pub type DestroyFn = unsafe fn(*mut CfObj);
pub type ToStringFn = unsafe extern "C-unwind" fn(*mut CfObj) -> *mut CfString;

/// Class metadata. Classes are static singletons and are not refcounted.
#[repr(C)]
pub struct CfClass {
    name: &'static str,
    parent: Option<&'static CfClass>,
    pub(crate) destroy: DestroyFn,
    pub(crate) to_string: ToStringFn,
}

impl CfClass {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn parent(&self) -> Option<&'static CfClass> {
        self.parent
    }

    /// Walks the parent chain looking for `other`.
    pub fn is_subclass_of(&self, other: &CfClass) -> bool {
        let mut current: Option<&CfClass> = Some(self);
        while let Some(klass) = current {
            if ptr::eq(klass, other) {
                return true;
            }
            current = klass.parent;
        }
        false
    }
}

impl std::fmt::Debug for CfClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CfClass")
            .field("name", &self.name)
            .field("parent", &self.parent.map(CfClass::name))
            .finish()
    }
}

pub static OBJ: CfClass = CfClass {
    name: "Clownfish::Obj",
    parent: None,
    destroy: destroy::<CfObj>,
    to_string: obj_to_string,
};

pub static STRING: CfClass = CfClass {
    name: "Clownfish::String",
    parent: Some(&OBJ),
    destroy: destroy::<CfString>,
    to_string: str_to_string,
};

pub static ERR: CfClass = CfClass {
    name: "Clownfish::Err",
    parent: Some(&OBJ),
    destroy: destroy::<CfErr>,
    to_string: err_to_string,
};

pub static BYTEBUF: CfClass = CfClass {
    name: "Clownfish::ByteBuf",
    parent: Some(&OBJ),
    destroy: destroy::<CfByteBuf>,
    to_string: bb_to_string,
};

pub static VECTOR: CfClass = CfClass {
    name: "Clownfish::Vector",
    parent: Some(&OBJ),
    destroy: destroy::<CfVector>,
    to_string: vec_to_string,
};

pub static HASH: CfClass = CfClass {
    name: "Clownfish::Hash",
    parent: Some(&OBJ),
    destroy: destroy::<CfHash>,
    to_string: obj_to_string,
};

pub(crate) static CORE_CLASSES: [&CfClass; 6] = [&OBJ, &STRING, &ERR, &BYTEBUF, &VECTOR, &HASH];

/// Process-wide name → class registry.
static REGISTRY: Lazy<RwLock<FxHashMap<&'static str, &'static CfClass>>> =
    Lazy::new(|| RwLock::new(FxHashMap::default()));

/// Registers `klass` under its name. Returns false if the name is taken.
pub fn register(klass: &'static CfClass) -> bool {
    let mut registry = REGISTRY.write();
    if registry.contains_key(klass.name) {
        return false;
    }
    registry.insert(klass.name, klass);
    true
}

pub fn fetch_class(name: &str) -> Option<&'static CfClass> {
    REGISTRY.read().get(name).copied()
}

/// FFI: Looks a class up by its UTF-8 name. Returns null when unknown.
#[no_mangle]
pub unsafe extern "C" fn cfish_class_fetch_class(name: *const u8, len: usize) -> *const CfClass {
    let bytes = crate::collections::string::bytes_from_raw(name, len);
    match std::str::from_utf8(bytes).ok().and_then(fetch_class) {
        Some(klass) => klass,
        None => ptr::null(),
    }
}

/// FFI: New string holding the class name.
#[no_mangle]
pub unsafe extern "C" fn cfish_class_get_name(klass: *const CfClass) -> *mut CfString {
    if klass.is_null() {
        return ptr::null_mut();
    }
    new_string((*klass).name)
}

/// FFI: Parent class, or null for the root.
#[no_mangle]
pub unsafe extern "C" fn cfish_class_get_parent(klass: *const CfClass) -> *const CfClass {
    if klass.is_null() {
        return ptr::null();
    }
    match (*klass).parent {
        Some(parent) => parent,
        None => ptr::null(),
    }
}
