use core::marker::PhantomData;
use core::mem;

/// Marker for types that may be overlaid directly on frame memory.
///
/// # Safety
///
/// Implementors must have an alignment of 1 and accept every bit pattern,
/// i.e. be `#[repr(C, packed)]` compositions of `u8` and `[u8; N]`.
pub unsafe trait Header: Copy {
    const LEN: usize = mem::size_of::<Self>();
}

unsafe impl Header for u8 {}

/// Bounds-checked read cursor over one received frame.
///
/// Holds the frame's `[start, end)` address range plus the current read
/// position. `overlay` is the only way to turn an address into a view, and it
/// refuses any view that would end past `end`.
#[derive(Clone, Copy)]
pub struct Cursor<'a> {
    start: usize,
    pos: usize,
    end: usize,
    _frame: PhantomData<&'a [u8]>,
}

impl<'a> Cursor<'a> {
    /// Build a cursor from raw frame bounds, as handed out by the XDP context.
    ///
    /// # Safety
    ///
    /// `[start, end)` must be readable for `'a` and must not be written to
    /// while the cursor or any view it produced is alive.
    #[inline(always)]
    pub unsafe fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            pos: start,
            end,
            _frame: PhantomData,
        }
    }

    #[inline(always)]
    pub fn from_slice(frame: &'a [u8]) -> Self {
        let start = frame.as_ptr() as usize;
        // SAFETY: the range is exactly the borrowed slice.
        unsafe { Self::new(start, start + frame.len()) }
    }

    /// View the next `T::LEN` bytes as a `T` and step past them.
    ///
    /// Returns `None`, leaving the position untouched, when fewer than
    /// `T::LEN` bytes remain.
    #[inline(always)]
    pub fn overlay<T: Header>(&mut self) -> Option<&'a T> {
        let at = self.pos;
        let view_end = at + T::LEN;
        if view_end > self.end {
            return None;
        }
        self.pos = view_end;
        // SAFETY: `[at, view_end)` lies within the frame, and `T: Header`
        // has alignment 1 and no invalid bit patterns.
        Some(unsafe { &*(at as *const T) })
    }

    /// Bytes left between the read position and the frame end.
    #[inline(always)]
    pub fn remaining(&self) -> usize {
        self.end - self.pos
    }

    /// Offset of the read position from the frame start.
    #[inline(always)]
    pub fn position(&self) -> usize {
        self.pos - self.start
    }

    /// Total frame length, independent of how far the cursor has advanced.
    #[inline(always)]
    pub fn frame_len(&self) -> usize {
        self.end - self.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C, packed)]
    #[derive(Clone, Copy)]
    struct Pair {
        a: [u8; 2],
        b: u8,
    }

    unsafe impl Header for Pair {}

    #[test]
    fn test_overlay_advances_on_success() {
        let frame = [1u8, 2, 3, 4, 5];
        let mut cursor = Cursor::from_slice(&frame);

        let pair = cursor.overlay::<Pair>().unwrap();
        assert_eq!(pair.a, [1, 2]);
        assert_eq!(pair.b, 3);
        assert_eq!(cursor.position(), 3);
        assert_eq!(cursor.remaining(), 2);
        assert_eq!(cursor.frame_len(), 5);
    }

    #[test]
    fn test_overlay_rejects_short_tail_without_moving() {
        let frame = [1u8, 2, 3, 4];
        let mut cursor = Cursor::from_slice(&frame);
        assert!(cursor.overlay::<Pair>().is_some());

        assert!(cursor.overlay::<Pair>().is_none());
        assert_eq!(cursor.position(), 3);
        assert_eq!(cursor.remaining(), 1);

        assert_eq!(*cursor.overlay::<u8>().unwrap(), 4);
        assert!(cursor.overlay::<u8>().is_none());
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn test_exact_fit_is_accepted() {
        let frame = [9u8, 8, 7];
        let mut cursor = Cursor::from_slice(&frame);
        assert!(cursor.overlay::<Pair>().is_some());
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn test_empty_frame() {
        let mut cursor = Cursor::from_slice(&[0u8; 0]);
        assert!(cursor.overlay::<u8>().is_none());
        assert_eq!(cursor.frame_len(), 0);
    }

    #[test]
    fn test_copies_are_independent() {
        let frame = [1u8, 2, 3, 4];
        let mut cursor = Cursor::from_slice(&frame);
        let snapshot = cursor;
        cursor.overlay::<Pair>().unwrap();
        assert_eq!(snapshot.position(), 0);
        assert_eq!(cursor.position(), 3);
    }
}
