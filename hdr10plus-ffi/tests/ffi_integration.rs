use std::ffi::{CStr, CString};
use std::io::Write;
use std::path::Path;
use std::ptr;

use hdr10plus_ffi::{
    Hdr10PlusData, Hdr10PlusJson, hdr10plus_data_free, hdr10plus_json_frame_count,
    hdr10plus_json_free, hdr10plus_json_get_error, hdr10plus_parse_json,
    hdr10plus_parse_json_file, hdr10plus_produce_payload, hdr10plus_write_payload,
};

const FRAME: &str = r#"{
    "LuminanceParameters": {
        "AverageRGB": 1037,
        "LuminanceDistributions": {
            "DistributionIndex": [1, 5, 10, 25, 50, 75, 90, 95, 99],
            "DistributionValues": [3, 43, 56, 219, 1036, 2714, 4668, 9024, 14445]
        },
        "MaxScl": [17830, 16895, 14252]
    },
    "NumberOfWindows": 1,
    "TargetedSystemDisplayMaximumLuminance": 0
}"#;

fn fixture_path() -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../hdr10plus/tests/assets/regular_metadata.json")
}

fn parse(text: &str) -> *mut Hdr10PlusJson {
    let handle = unsafe { hdr10plus_parse_json(text.as_ptr(), text.len()) };
    assert!(!handle.is_null());
    handle
}

fn error_of(handle: *const Hdr10PlusJson) -> Option<String> {
    let err = unsafe { hdr10plus_json_get_error(handle) };
    if err.is_null() {
        None
    } else {
        Some(unsafe { CStr::from_ptr(err) }.to_string_lossy().into_owned())
    }
}

fn bytes_of(data: *const Hdr10PlusData) -> Vec<u8> {
    assert!(!data.is_null());
    let data = unsafe { &*data };
    unsafe { std::slice::from_raw_parts(data.data, data.len) }.to_vec()
}

#[test]
fn parse_file_and_produce_complete_payload() {
    let path = CString::new(fixture_path().to_str().unwrap()).unwrap();
    let handle = unsafe { hdr10plus_parse_json_file(path.as_ptr()) };
    assert!(!handle.is_null());
    assert_eq!(error_of(handle), None);
    assert_eq!(unsafe { hdr10plus_json_frame_count(handle) }, 1);

    let data = unsafe { hdr10plus_produce_payload(handle, 0, true) };
    let bytes = bytes_of(data);
    assert_eq!(bytes.len(), 49);
    assert_eq!(&bytes[..7], &[0xB5, 0x00, 0x3C, 0x00, 0x01, 0x04, 0x01]);

    unsafe {
        hdr10plus_data_free(data);
        hdr10plus_json_free(handle);
    }
}

#[test]
fn parse_file_from_tempdir() {
    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("frame.json");
    let mut file = std::fs::File::create(&file_path).unwrap();
    file.write_all(FRAME.as_bytes()).unwrap();
    drop(file);

    let path = CString::new(file_path.to_str().unwrap()).unwrap();
    let handle = unsafe { hdr10plus_parse_json_file(path.as_ptr()) };
    assert_eq!(error_of(handle), None);

    let raw = unsafe { hdr10plus_produce_payload(handle, 0, false) };
    assert_eq!(bytes_of(raw).len(), 48);

    unsafe {
        hdr10plus_data_free(raw);
        hdr10plus_json_free(handle);
    }
}

#[test]
fn missing_file_reports_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = CString::new(dir.path().join("absent.json").to_str().unwrap()).unwrap();

    let handle = unsafe { hdr10plus_parse_json_file(path.as_ptr()) };
    assert!(!handle.is_null());
    let err = error_of(handle).unwrap();
    assert!(err.starts_with("hdr10plus_parse_json_file"), "{err}");
    assert_eq!(unsafe { hdr10plus_json_frame_count(handle) }, 0);

    unsafe { hdr10plus_json_free(handle) };
}

#[test]
fn invalid_utf8_path_reports_error() {
    let path = CString::new(vec![b'/', 0xFF, 0xFE]).unwrap();
    let handle = unsafe { hdr10plus_parse_json_file(path.as_ptr()) };
    assert!(!handle.is_null());
    assert!(error_of(handle).is_some());

    unsafe { hdr10plus_json_free(handle) };
}

#[test]
fn matches_library_output() {
    let doc = hdr10plus::MetadataDocument::from_json_str(FRAME, &Default::default()).unwrap();
    let handle = parse(FRAME);

    for mode in 0..3u32 {
        let data = unsafe { hdr10plus_write_payload(handle, 0, mode) };
        assert_eq!(
            bytes_of(data),
            doc.produce_payload_with_mode(0, mode).unwrap(),
            "mode {mode}"
        );
        unsafe { hdr10plus_data_free(data) };
    }

    unsafe { hdr10plus_json_free(handle) };
}

#[test]
fn parse_error_is_isolated() {
    let bad = FRAME.replace("1037", "-1");
    let handle = parse(&bad);

    let err = error_of(handle).unwrap();
    assert!(err.starts_with("hdr10plus_parse_json"), "{err}");
    assert!(err.contains("AverageRGB"), "{err}");

    assert!(unsafe { hdr10plus_produce_payload(handle, 0, true) }.is_null());
    assert!(unsafe { hdr10plus_write_payload(handle, 0, 2) }.is_null());
    assert_eq!(error_of(handle).unwrap(), err);

    let good = parse(FRAME);
    assert_eq!(error_of(good), None);
    let data = unsafe { hdr10plus_produce_payload(good, 0, true) };
    assert_eq!(bytes_of(data).len(), 49);

    unsafe {
        hdr10plus_data_free(data);
        hdr10plus_json_free(good);
        hdr10plus_json_free(handle);
    }
}

#[test]
fn syntax_error_reports_error() {
    let handle = parse("{\"NumberOfWindows\": ");
    assert!(error_of(handle).is_some());
    unsafe { hdr10plus_json_free(handle) };
}

#[test]
fn failed_payload_sets_error_until_next_success() {
    let handle = parse(FRAME);

    assert!(unsafe { hdr10plus_produce_payload(handle, 5, true) }.is_null());
    let err = error_of(handle).unwrap();
    assert!(err.contains("frame 5"), "{err}");

    assert!(unsafe { hdr10plus_write_payload(handle, 0, 9) }.is_null());
    assert!(error_of(handle).unwrap().contains("mode"));

    let data = unsafe { hdr10plus_write_payload(handle, 0, 1) };
    assert_eq!(bytes_of(data).len(), 49);
    assert_eq!(error_of(handle), None);

    unsafe {
        hdr10plus_data_free(data);
        hdr10plus_json_free(handle);
    }
}

#[test]
fn error_strings_outlive_later_payload_calls() {
    let handle = parse(FRAME);

    assert!(unsafe { hdr10plus_write_payload(handle, 3, 1) }.is_null());
    let first = unsafe { hdr10plus_json_get_error(handle) };
    assert!(!first.is_null());
    let expected = unsafe { CStr::from_ptr(first) }.to_owned();

    assert!(unsafe { hdr10plus_write_payload(handle, 0, 42) }.is_null());
    let data = unsafe { hdr10plus_write_payload(handle, 0, 1) };
    assert!(!data.is_null());
    assert!(unsafe { hdr10plus_write_payload(handle, 3, 1) }.is_null());

    assert_eq!(unsafe { CStr::from_ptr(first) }, expected.as_c_str());
    assert_eq!(unsafe { hdr10plus_json_get_error(handle) }, first);

    unsafe {
        hdr10plus_data_free(data);
        hdr10plus_json_free(handle);
    }
}

#[test]
fn concurrent_payload_calls_keep_errors_readable() {
    let handle = parse(FRAME);
    assert!(unsafe { hdr10plus_write_payload(handle, 7, 1) }.is_null());
    let err = unsafe { hdr10plus_json_get_error(handle) };
    let expected = unsafe { CStr::from_ptr(err) }.to_owned();

    let addr = handle as usize;
    let workers: Vec<_> = (0..4)
        .map(|t| {
            std::thread::spawn(move || {
                let handle = addr as *const Hdr10PlusJson;
                for i in 0..50 {
                    let index = if (i + t) % 2 == 0 { 0 } else { 9 + t };
                    let data = unsafe { hdr10plus_write_payload(handle, index, 1) };
                    unsafe { hdr10plus_data_free(data) };
                }
            })
        })
        .collect();

    for _ in 0..50 {
        assert_eq!(unsafe { CStr::from_ptr(err) }, expected.as_c_str());
    }
    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(unsafe { CStr::from_ptr(err) }, expected.as_c_str());

    unsafe { hdr10plus_json_free(handle) };
}

#[test]
fn buffers_are_independent() {
    let handle = parse(FRAME);

    let first = unsafe { hdr10plus_produce_payload(handle, 0, true) };
    let second = unsafe { hdr10plus_produce_payload(handle, 0, true) };
    assert_ne!(unsafe { (*first).data }, unsafe { (*second).data });

    let expected = bytes_of(second);
    unsafe { hdr10plus_data_free(first) };
    assert_eq!(bytes_of(second), expected);

    // Buffers outlive the handle.
    unsafe { hdr10plus_json_free(handle) };
    assert_eq!(bytes_of(second), expected);
    unsafe { hdr10plus_data_free(second) };
}

#[test]
fn null_arguments_are_safe() {
    assert!(unsafe { hdr10plus_parse_json_file(ptr::null()) }.is_null());
    assert!(unsafe { hdr10plus_parse_json(ptr::null(), 0) }.is_null());
    assert!(unsafe { hdr10plus_json_get_error(ptr::null()) }.is_null());
    assert_eq!(unsafe { hdr10plus_json_frame_count(ptr::null()) }, 0);
    assert!(unsafe { hdr10plus_produce_payload(ptr::null(), 0, true) }.is_null());
    assert!(unsafe { hdr10plus_write_payload(ptr::null(), 0, 0) }.is_null());

    unsafe {
        hdr10plus_json_free(ptr::null_mut());
        hdr10plus_data_free(ptr::null());
    }
}
