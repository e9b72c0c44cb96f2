//! C interface over [`hdr10plus`].
//!
//! A parse call always returns a handle, even when parsing failed; check
//! `hdr10plus_json_get_error` before producing payloads and free the handle
//! with `hdr10plus_json_free` in both cases. Every returned `Hdr10PlusData`
//! belongs to the caller and must be released with `hdr10plus_data_free`.

use std::ffi::{CStr, CString, c_char};
use std::path::Path;
use std::ptr;
use std::sync::Mutex;

use hdr10plus::{Error, MetadataConfig, MetadataDocument, PayloadMode};
use tracing::warn;

pub struct Hdr10PlusJson {
    document: Result<MetadataDocument, CString>,
    payload_error: Mutex<PayloadErrors>,
}

/// Messages handed out by `hdr10plus_json_get_error` stay allocated until the
/// handle is freed.
#[derive(Default)]
struct PayloadErrors {
    messages: Vec<CString>,
    current: Option<usize>,
}

impl PayloadErrors {
    fn set(&mut self, message: CString) {
        let index = match self.messages.iter().position(|m| *m == message) {
            Some(index) => index,
            None => {
                self.messages.push(message);
                self.messages.len() - 1
            }
        };
        self.current = Some(index);
    }

    fn current(&self) -> Option<&CString> {
        self.current.and_then(|i| self.messages.get(i))
    }
}

#[repr(C)]
pub struct Hdr10PlusData {
    pub data: *const u8,
    pub len: usize,
}

fn to_cstring(message: String) -> CString {
    // Interior NULs cannot cross the boundary.
    CString::new(message.replace('\0', " ")).unwrap_or_default()
}

impl Hdr10PlusJson {
    fn new(document: Result<MetadataDocument, Error>, context: &str) -> Self {
        let document = document.map_err(|e| {
            warn!(error = %e, "{context} failed");
            to_cstring(format!("{context}: {e}"))
        });

        Self {
            document,
            payload_error: Mutex::default(),
        }
    }

    fn produce(&self, frame_index: usize, mode: u32) -> Option<Vec<u8>> {
        let document = self.document.as_ref().ok()?;

        let result = document.produce_payload_with_mode(frame_index, mode);
        let mut slot = self
            .payload_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match result {
            Ok(buf) => {
                slot.current = None;
                Some(buf)
            }
            Err(e) => {
                warn!(error = %e, frame_index, mode, "payload generation failed");
                slot.set(to_cstring(format!("Failed writing byte buffer: {e}")));
                None
            }
        }
    }

    fn error_ptr(&self) -> *const c_char {
        if let Err(e) = &self.document {
            return e.as_ptr();
        }

        let slot = self
            .payload_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        slot.current().map_or(ptr::null(), |e| e.as_ptr())
    }
}

impl From<Vec<u8>> for Hdr10PlusData {
    fn from(buf: Vec<u8>) -> Self {
        let data = buf.into_boxed_slice();
        let len = data.len();
        Self {
            data: Box::into_raw(data) as *const u8,
            len,
        }
    }
}

fn into_handle(handle: Hdr10PlusJson) -> *mut Hdr10PlusJson {
    Box::into_raw(Box::new(handle))
}

fn into_data(buf: Option<Vec<u8>>) -> *const Hdr10PlusData {
    match buf {
        Some(buf) => Box::into_raw(Box::new(Hdr10PlusData::from(buf))),
        None => ptr::null(),
    }
}

/// # Safety
/// `path` must be null or a valid NUL-terminated string.
///
/// Reads and parses a HDR10+ JSON file.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hdr10plus_parse_json_file(path: *const c_char) -> *mut Hdr10PlusJson {
    if path.is_null() {
        return ptr::null_mut();
    }

    let context = "hdr10plus_parse_json_file";
    let document = match unsafe { CStr::from_ptr(path) }.to_str() {
        Ok(path) => std::fs::read(Path::new(path))
            .map_err(Error::from)
            .and_then(|data| {
                MetadataDocument::from_json_slice(&data, &MetadataConfig::default())
            }),
        Err(_) => {
            return into_handle(Hdr10PlusJson {
                document: Err(to_cstring(format!(
                    "{context}: failed parsing the input path as a string"
                ))),
                payload_error: Mutex::default(),
            });
        }
    };

    into_handle(Hdr10PlusJson::new(document, context))
}

/// # Safety
/// `data` must be null or point to `len` readable bytes.
///
/// Parses HDR10+ JSON from memory.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hdr10plus_parse_json(data: *const u8, len: usize) -> *mut Hdr10PlusJson {
    if data.is_null() {
        return ptr::null_mut();
    }

    let bytes = unsafe { std::slice::from_raw_parts(data, len) };
    let document = MetadataDocument::from_json_slice(bytes, &MetadataConfig::default());

    into_handle(Hdr10PlusJson::new(document, "hdr10plus_parse_json"))
}

/// # Safety
/// `handle` must be null or come from a parse function and not be freed.
///
/// The parse error, or the error of the last failed payload call. Null when
/// there is none, or when the last payload call succeeded. The string stays
/// valid until the handle is freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hdr10plus_json_get_error(handle: *const Hdr10PlusJson) -> *const c_char {
    if handle.is_null() {
        return ptr::null();
    }

    unsafe { &*handle }.error_ptr()
}

/// # Safety
/// `handle` must be null or come from a parse function and not be freed.
///
/// Number of frames, 0 for an errored handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hdr10plus_json_frame_count(handle: *const Hdr10PlusJson) -> usize {
    if handle.is_null() {
        return 0;
    }

    unsafe { &*handle }
        .document
        .as_ref()
        .map_or(0, MetadataDocument::len)
}

/// # Safety
/// `handle` must be null or come from a parse function and not be freed.
///
/// Encodes one frame as a T.35 payload, with the country code when `complete`
/// is set. Returns null on error.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hdr10plus_produce_payload(
    handle: *const Hdr10PlusJson,
    frame_index: usize,
    complete: bool,
) -> *const Hdr10PlusData {
    let mode = if complete {
        PayloadMode::Complete
    } else {
        PayloadMode::Raw
    };

    unsafe { hdr10plus_write_payload(handle, frame_index, mode as u32) }
}

/// # Safety
/// `handle` must be null or come from a parse function and not be freed.
///
/// Encodes one frame in `mode`: 0 raw T.35, 1 complete T.35, 2 AV1 metadata
/// OBU. Returns null on error.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hdr10plus_write_payload(
    handle: *const Hdr10PlusJson,
    frame_index: usize,
    mode: u32,
) -> *const Hdr10PlusData {
    if handle.is_null() {
        return ptr::null();
    }

    into_data(unsafe { &*handle }.produce(frame_index, mode))
}

/// # Safety
/// `handle` must be null or come from a parse function, freed only once.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hdr10plus_json_free(handle: *mut Hdr10PlusJson) {
    if !handle.is_null() {
        drop(unsafe { Box::from_raw(handle) });
    }
}

/// # Safety
/// `data` must be null or come from a payload function, freed only once.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hdr10plus_data_free(data: *const Hdr10PlusData) {
    if data.is_null() {
        return;
    }

    let data = unsafe { Box::from_raw(data as *mut Hdr10PlusData) };
    if !data.data.is_null() {
        unsafe {
            let slice_ptr = std::slice::from_raw_parts_mut(data.data as *mut u8, data.len);
            drop(Box::from_raw(slice_ptr as *mut [u8]));
        }
    }
}
