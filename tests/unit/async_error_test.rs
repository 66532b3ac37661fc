//! Tests for the asynchronous error taxonomy

use accel_events::core::{Errc, ErrorCode, Exception, ExceptionList, SYCL_CATEGORY};

#[test]
fn test_errc_values_are_stable() {
    assert_eq!(Errc::Success as i32, 0);
    assert_eq!(Errc::Runtime as i32, 1);
    assert_eq!(Errc::BackendMismatch as i32, 14);
    assert_eq!(Errc::ALL.len(), 15);
    for errc in Errc::ALL {
        assert_eq!(Errc::from_value(errc as i32), Some(errc));
    }
    assert_eq!(Errc::from_value(99), None);
}

#[test]
fn test_error_code_names() {
    assert_eq!(Errc::NdRange.as_str(), "nd_range");
    assert_eq!(Errc::KernelArgument.to_string(), "kernel_argument");
    let code = ErrorCode::from(Errc::MemoryAllocation);
    assert_eq!(code.category().name(), "sycl");
    assert_eq!(code.to_string(), "sycl:memory_allocation");
}

#[test]
fn test_exception_without_message_uses_category_text() {
    let ex = Exception::new(Errc::Platform);
    assert_eq!(ex.what(), SYCL_CATEGORY.message());
    assert!(!ex.has_context());
    assert_eq!(ex.code().errc(), Some(Errc::Platform));
}

#[test]
fn test_exception_list_display() {
    let list = ExceptionList::from(vec![
        Exception::with_message(Errc::Kernel, "bad launch"),
        Exception::with_message(Errc::MemoryAllocation, "oom"),
    ]);
    assert_eq!(list.len(), 2);
    let text = list.to_string();
    assert!(text.contains("bad launch") && text.contains("oom"));
}

#[test]
fn test_exception_composes_with_anyhow() {
    fn fails() -> anyhow::Result<()> {
        Err(Exception::with_message(Errc::Kernel, "bad launch"))?;
        Ok(())
    }
    let err = fails().unwrap_err();
    assert_eq!(err.to_string(), "[sycl:kernel] bad launch");
    assert!(err.downcast_ref::<Exception>().is_some());
}
