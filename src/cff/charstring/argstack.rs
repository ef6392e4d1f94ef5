// This file is derived from ttf-parser, licenced under Apache-2.0.
// https://github.com/RazrFalcon/ttf-parser/blob/439aaaebd50eb8aed66302e3c1b51fae047f85b2/src/tables/cff/argstack.rs

use std::fmt::Debug;

/// Returned when a push would exceed the capacity of the stack.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StackOverflow;

/// Storage for the CFF operand stack when interpreting CharStrings.
pub struct ArgumentsStack<'a, T>
where
    T: Debug,
{
    pub data: &'a mut [T],
    pub len: usize,
    pub max_len: usize,
}

impl<'a, T> ArgumentsStack<'a, T>
where
    T: Copy + Debug,
{
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push(&mut self, n: T) -> Result<(), StackOverflow> {
        if self.len == self.max_len {
            Err(StackOverflow)
        } else {
            self.data[self.len] = n;
            self.len += 1;
            Ok(())
        }
    }

    pub fn pop(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        self.len -= 1;
        Some(self.data[self.len])
    }

    /// pop n values from the stack
    pub fn pop_n(&mut self, n: usize) -> Option<&[T]> {
        if n > self.len {
            return None;
        }
        self.len -= n;
        Some(&self.data[self.len..self.len + n])
    }

    /// The value `depth` places below the top of the stack, 0 being the top.
    pub fn peek(&self, depth: usize) -> Option<T> {
        self.len
            .checked_sub(depth + 1)
            .map(|index| self.data[index])
    }

    /// Rotate the top `n` values by `shift` places towards the top of the stack.
    ///
    /// Negative shifts rotate towards the bottom.
    pub fn roll(&mut self, n: usize, shift: isize) -> Option<()> {
        if n > self.len {
            return None;
        }
        if n == 0 {
            return Some(());
        }
        let top = &mut self.data[self.len - n..self.len];
        let shift = shift.rem_euclid(n as isize) as usize;
        top.rotate_right(shift);
        Some(())
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }
}

impl<T: Debug> Debug for ArgumentsStack<'_, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(&self.data[..self.len]).finish()
    }
}
