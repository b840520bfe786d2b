//! Element types that may be viewed straight out of fresh segment memory.

use std::sync::atomic::{
    AtomicBool, AtomicI32, AtomicI64, AtomicPtr, AtomicU16, AtomicU32, AtomicU64, AtomicU8,
    AtomicUsize,
};

/// Types for which the all-zero bit pattern is a valid value.
///
/// Untouched segment pages read as zero, so a segment can be viewed as a
/// slice of any `ZeroInit` type without initialising it first.
///
/// # Safety
///
/// Implementors must accept an all-zero byte pattern as a valid value and
/// must not need dropping (segments never run destructors).
#[allow(unsafe_code)]
pub unsafe trait ZeroInit: Sized {}

macro_rules! impl_zero_init {
    ($($ty:ty),* $(,)?) => {
        $(
            // SAFETY: zero is a valid value of every integer and atomic type.
            #[allow(unsafe_code)]
            unsafe impl ZeroInit for $ty {}
        )*
    };
}

impl_zero_init!(
    u8, u16, u32, u64, usize, i8, i16, i32, i64, isize, AtomicBool, AtomicU8, AtomicU16,
    AtomicU32, AtomicU64, AtomicUsize, AtomicI32, AtomicI64,
);

// SAFETY: a zeroed AtomicPtr is a null pointer.
#[allow(unsafe_code)]
unsafe impl<T> ZeroInit for AtomicPtr<T> {}

// SAFETY: an array of zero-valid elements is zero-valid.
#[allow(unsafe_code)]
unsafe impl<T: ZeroInit, const N: usize> ZeroInit for [T; N] {}
