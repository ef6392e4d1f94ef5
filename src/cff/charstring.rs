//! Discover the glyphs and subroutines reachable from a set of glyphs.
//!
//! Charstrings are interpreted only as far as is needed to follow subroutine calls. Outlines are
//! never built, but the operand stack is evaluated so that the value on top of it when a call is
//! made is the one the font intends, and stem hints are counted so the bytes of a `hintmask` can
//! be stepped over.
//!
//! Refer to Adobe Technical Note #5177, The Type 2 Charstring Format and the Type 1 Font Format
//! for the operators.

use std::fmt;

use itertools::Itertools;
use log::{debug, warn};
use rustc_hash::FxHashSet;

use crate::binary::read::{ReadCtxt, ReadEof, ReadScope};

use super::{CharstringType, Font, Index, CFF};

mod argstack;

pub use argstack::{ArgumentsStack, StackOverflow};

// Limits according to the Adobe Technical Note #5177 Appendix B.
pub(crate) const STACK_LIMIT: u8 = 10;
pub(crate) const MAX_ARGUMENTS_STACK_LEN: usize = 48;
const TRANSIENT_ARRAY_LEN: usize = 32;

/// Upper bound on the operators and operands interpreted for a single glyph.
const EXECUTION_BUDGET: usize = 100_000;

pub(crate) const TWO_BYTE_OPERATOR_MARK: u8 = 12;

pub type GlyphId = u16;

/// Positions within an INDEX that are reachable. Marks are only ever added.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UsedSet(FxHashSet<usize>);

/// The reachable parts of a font.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Usage {
    pub char_strings: UsedSet,
    pub global_subrs: UsedSet,
    /// Local subroutines in use, one set for each Font DICT.
    pub local_subrs: Vec<UsedSet>,
    /// Font DICTs that hold at least one used glyph.
    pub font_dicts: UsedSet,
    /// Calls that could not be resolved and were skipped.
    pub skipped_calls: usize,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum SubroutineIndex {
    Local,
    Global,
}

/// What to do after interpreting one operator.
enum Flow {
    Continue,
    EndGlyph,
}

/// Conditions that abandon the rest of a glyph.
#[derive(Debug)]
enum Interrupt {
    Truncated,
    StackOverflow,
    StackUnderflow,
}

/// Interpreter state for one glyph.
///
/// The operand stack, transient array and hint count are shared by the glyph and every
/// subroutine it calls.
struct CharStringVisitorContext<'a, 'f> {
    charstring_type: CharstringType,
    global_subr_index: &'f Index<'a>,
    local_subr_index: Option<&'f Index<'a>>,
    font_dict: usize,
    glyph_id: GlyphId,
    stems_len: usize,
    steps: usize,
    transient: [f64; TRANSIENT_ARRAY_LEN],
    /// PostScript operand stack used by Type 1 `callothersubr` and `pop`.
    ps_stack: Vec<f64>,
    /// The charstring being interpreted followed by the subroutines entered from it.
    frames: Vec<ReadCtxt<'a>>,
}

impl UsedSet {
    pub fn new() -> Self {
        UsedSet(FxHashSet::default())
    }

    /// Mark `index` as used, returning `true` if it was not already marked.
    pub fn mark(&mut self, index: usize) -> bool {
        self.0.insert(index)
    }

    pub fn contains(&self, index: usize) -> bool {
        self.0.contains(&index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The marked positions in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied().sorted()
    }
}

impl FromIterator<usize> for UsedSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        UsedSet(iter.into_iter().collect())
    }
}

impl Usage {
    fn new(font_dict_count: usize) -> Self {
        Usage {
            char_strings: UsedSet::new(),
            global_subrs: UsedSet::new(),
            local_subrs: vec![UsedSet::new(); font_dict_count],
            font_dicts: UsedSet::new(),
            skipped_calls: 0,
        }
    }
}

/// Compute the CharStrings, global subroutines and local subroutines reachable from `glyph_ids`.
///
/// Calls that can't be resolved are skipped and counted rather than treated as errors.
pub fn compute_used<'a>(cff: &CFF<'a>, font: &Font<'a>, glyph_ids: &[GlyphId]) -> Usage {
    let mut usage = Usage::new(font.font_dict_count());
    let mut data = [0.0; MAX_ARGUMENTS_STACK_LEN];

    for &glyph_id in glyph_ids {
        let char_string = font
            .char_strings_index
            .read_object(usize::from(glyph_id));
        let font_dict = font.font_dict_for_glyph(glyph_id);
        let (char_string, font_dict) = match (char_string, font_dict) {
            (Some(char_string), Some(font_dict)) => (char_string, font_dict),
            _ => {
                warn!("glyph {} is not in the CharStrings INDEX, skipping", glyph_id);
                continue;
            }
        };

        if !usage.char_strings.mark(usize::from(glyph_id)) {
            continue;
        }
        usage.font_dicts.mark(font_dict);

        let mut stack = ArgumentsStack {
            data: &mut data,
            len: 0,
            max_len: MAX_ARGUMENTS_STACK_LEN,
        };
        let mut ctx = CharStringVisitorContext {
            charstring_type: font.charstring_type,
            global_subr_index: &cff.global_subr_index,
            local_subr_index: font.local_subr_index(font_dict),
            font_dict,
            glyph_id,
            stems_len: 0,
            steps: 0,
            transient: [0.0; TRANSIENT_ARRAY_LEN],
            ps_stack: Vec::new(),
            frames: Vec::new(),
        };
        ctx.visit(char_string, &mut stack, &mut usage);
    }

    debug!(
        "{} of {} glyphs used, {} global subrs, {} local subrs, {} skipped calls",
        usage.char_strings.len(),
        font.n_glyphs(),
        usage.global_subrs.len(),
        usage.local_subrs.iter().map(UsedSet::len).sum::<usize>(),
        usage.skipped_calls
    );

    usage
}

impl<'a, 'f> CharStringVisitorContext<'a, 'f> {
    fn visit(
        &mut self,
        char_string: &'a [u8],
        stack: &mut ArgumentsStack<'_, f64>,
        usage: &mut Usage,
    ) {
        self.frames.push(ReadScope::new(char_string).ctxt());

        while let Some(ctxt) = self.frames.last() {
            // Running off the end of a subroutine is an implicit return
            if !ctxt.bytes_available() {
                self.frames.pop();
                continue;
            }

            self.steps += 1;
            if self.steps > EXECUTION_BUDGET {
                warn!(
                    "glyph {}: execution budget exceeded, abandoning glyph",
                    self.glyph_id
                );
                break;
            }

            match self.step(stack, usage) {
                Ok(Flow::Continue) => {}
                Ok(Flow::EndGlyph) => break,
                Err(interrupt) => {
                    warn!("glyph {}: {}, abandoning glyph", self.glyph_id, interrupt);
                    break;
                }
            }
        }
    }

    fn current(&mut self) -> Result<&mut ReadCtxt<'a>, Interrupt> {
        self.frames.last_mut().ok_or(Interrupt::Truncated)
    }

    fn step(
        &mut self,
        stack: &mut ArgumentsStack<'_, f64>,
        usage: &mut Usage,
    ) -> Result<Flow, Interrupt> {
        let charstring_type = self.charstring_type;
        let s = self.current()?;
        let op = s.read_u8()?;
        let value = match op {
            operator::SHORT_INT => f64::from(s.read_i16be()?),
            32..=246 => parse_int1(op),
            247..=250 => parse_int2(op, s)?,
            251..=254 => parse_int3(op, s)?,
            operator::FIXED_16_16 => {
                let n = s.read_i32be()?;
                match charstring_type {
                    CharstringType::Type1 => f64::from(n),
                    CharstringType::Type2 => f64::from(n) / 65536.0,
                }
            }
            TWO_BYTE_OPERATOR_MARK => {
                let op2 = s.read_u8()?;
                return self.visit_escaped(op2, stack);
            }
            _ => return self.visit_operator(op, stack, usage),
        };
        stack.push(value)?;

        Ok(Flow::Continue)
    }

    fn visit_operator(
        &mut self,
        op: u8,
        stack: &mut ArgumentsStack<'_, f64>,
        usage: &mut Usage,
    ) -> Result<Flow, Interrupt> {
        let is_type2 = self.charstring_type == CharstringType::Type2;
        match op {
            operator::HORIZONTAL_STEM
            | operator::VERTICAL_STEM
            | operator::HORIZONTAL_STEM_HINT_MASK
            | operator::VERTICAL_STEM_HINT_MASK => {
                // An odd operand count includes the width, which the division discards
                self.stems_len += stack.len() / 2;
                stack.clear();
            }
            operator::HINT_MASK | operator::COUNTER_MASK if is_type2 => {
                // Operands left on the stack are an implicit vstem
                self.stems_len += stack.len() / 2;
                stack.clear();
                let mask_len = ((self.stems_len + 7) / 8).max(1);
                self.current()?.read_slice(mask_len)?;
            }
            operator::CALL_LOCAL_SUBROUTINE => {
                return self.call_subr(SubroutineIndex::Local, stack, usage);
            }
            operator::CALL_GLOBAL_SUBROUTINE if is_type2 => {
                return self.call_subr(SubroutineIndex::Global, stack, usage);
            }
            operator::RETURN => {
                self.frames.pop();
            }
            operator::ENDCHAR => {
                if let Some((base, accent)) = accent_components(self.charstring_type, stack) {
                    debug!(
                        "glyph {}: endchar composes codes {} and {}, the components are not retained",
                        self.glyph_id, base, accent
                    );
                }
                return Ok(Flow::EndGlyph);
            }
            _ => stack.clear(),
        }

        Ok(Flow::Continue)
    }

    fn visit_escaped(
        &mut self,
        op: u8,
        stack: &mut ArgumentsStack<'_, f64>,
    ) -> Result<Flow, Interrupt> {
        match op {
            operator::AND => binary(stack, |a, b| truth(a != 0.0 && b != 0.0))?,
            operator::OR => binary(stack, |a, b| truth(a != 0.0 || b != 0.0))?,
            operator::EQ => binary(stack, |a, b| truth(a == b))?,
            operator::ADD => binary(stack, |a, b| a + b)?,
            operator::SUB => binary(stack, |a, b| a - b)?,
            operator::MUL => binary(stack, |a, b| a * b)?,
            operator::DIV => binary(stack, |a, b| a / b)?,
            operator::NOT => unary(stack, |a| truth(a == 0.0))?,
            operator::ABS => unary(stack, f64::abs)?,
            operator::NEG => unary(stack, |a| -a)?,
            operator::SQRT => unary(stack, f64::sqrt)?,
            operator::DROP => {
                pop(stack)?;
            }
            operator::EXCH => {
                let b = pop(stack)?;
                let a = pop(stack)?;
                stack.push(b)?;
                stack.push(a)?;
            }
            operator::INDEX => {
                let i = pop(stack)?;
                // A negative index copies the top element
                let depth = if i < 0.0 { Some(0) } else { as_index(i) };
                let value = depth
                    .and_then(|depth| stack.peek(depth))
                    .ok_or(Interrupt::StackUnderflow)?;
                stack.push(value)?;
            }
            operator::ROLL => {
                let shift = pop(stack)?;
                let n = pop(stack)?;
                let n = as_index(n).ok_or(Interrupt::StackUnderflow)?;
                stack
                    .roll(n, shift as isize)
                    .ok_or(Interrupt::StackUnderflow)?;
            }
            operator::PUT => {
                let i = pop(stack)?;
                let value = pop(stack)?;
                if let Some(slot) = as_index(i).and_then(|i| self.transient.get_mut(i)) {
                    *slot = value;
                }
            }
            operator::GET => {
                let i = pop(stack)?;
                let value = as_index(i)
                    .and_then(|i| self.transient.get(i).copied())
                    .unwrap_or(f64::NAN);
                stack.push(value)?;
            }
            operator::IFELSE => {
                let v2 = pop(stack)?;
                let v1 = pop(stack)?;
                let s2 = pop(stack)?;
                let s1 = pop(stack)?;
                stack.push(if v1 <= v2 { s1 } else { s2 })?;
            }
            // The value is unknown so it can never select a subroutine
            operator::RANDOM => stack.push(f64::NAN)?,
            operator::DUP => {
                let value = stack.peek(0).ok_or(Interrupt::StackUnderflow)?;
                stack.push(value)?;
            }
            operator::CALL_OTHERSUBR if self.charstring_type == CharstringType::Type1 => {
                // arg1 ... argn n othersubr# callothersubr
                let _othersubr = pop(stack)?;
                let n = as_index(pop(stack)?).ok_or(Interrupt::StackUnderflow)?;
                let args = stack.pop_n(n).ok_or(Interrupt::StackUnderflow)?;
                self.ps_stack.extend_from_slice(args);
            }
            operator::POP if self.charstring_type == CharstringType::Type1 => {
                let value = self.ps_stack.pop().unwrap_or(f64::NAN);
                stack.push(value)?;
            }
            _ => stack.clear(),
        }

        Ok(Flow::Continue)
    }

    fn call_subr(
        &mut self,
        subr: SubroutineIndex,
        stack: &mut ArgumentsStack<'_, f64>,
        usage: &mut Usage,
    ) -> Result<Flow, Interrupt> {
        let operand = pop(stack)?;
        let subrs = match subr {
            SubroutineIndex::Local => match self.local_subr_index {
                Some(subrs) => subrs,
                None => return Ok(self.skip_call(subr, "no local subroutines", usage)),
            },
            SubroutineIndex::Global => self.global_subr_index,
        };

        // The glyph's own charstring is the first frame
        if self.frames.len() > usize::from(STACK_LIMIT) {
            return Ok(self.skip_call(subr, "nesting limit reached", usage));
        }

        let bias = subr_bias(self.charstring_type, subrs.count);
        let index = match conv_subroutine_index(operand, bias) {
            Some(index) if index < subrs.count => index,
            _ => return Ok(self.skip_call(subr, "index out of range", usage)),
        };
        let char_string = match subrs.read_object(index) {
            Some(char_string) => char_string,
            None => return Ok(self.skip_call(subr, "index out of range", usage)),
        };

        match subr {
            SubroutineIndex::Local => usage.local_subrs[self.font_dict].mark(index),
            SubroutineIndex::Global => usage.global_subrs.mark(index),
        };
        // Already marked subroutines are interpreted again so the stack and hint count follow
        // this call.
        self.frames.push(ReadScope::new(char_string).ctxt());

        Ok(Flow::Continue)
    }

    fn skip_call(&self, subr: SubroutineIndex, reason: &str, usage: &mut Usage) -> Flow {
        warn!(
            "glyph {}: skipping call to {}: {}",
            self.glyph_id, subr, reason
        );
        usage.skipped_calls += 1;
        Flow::Continue
    }
}

fn pop(stack: &mut ArgumentsStack<'_, f64>) -> Result<f64, Interrupt> {
    stack.pop().ok_or(Interrupt::StackUnderflow)
}

fn unary(
    stack: &mut ArgumentsStack<'_, f64>,
    func: impl Fn(f64) -> f64,
) -> Result<(), Interrupt> {
    let a = pop(stack)?;
    stack.push(func(a))?;
    Ok(())
}

fn binary(
    stack: &mut ArgumentsStack<'_, f64>,
    func: impl Fn(f64, f64) -> f64,
) -> Result<(), Interrupt> {
    let b = pop(stack)?;
    let a = pop(stack)?;
    stack.push(func(a, b))?;
    Ok(())
}

/// The base and accent character codes of a Type 2 `endchar` that composes an accented glyph.
///
/// Four operands, or five with the width, are `adx ady bchar achar`.
fn accent_components(
    charstring_type: CharstringType,
    stack: &ArgumentsStack<'_, f64>,
) -> Option<(f64, f64)> {
    match charstring_type {
        CharstringType::Type2 if stack.len() >= 4 => Some((stack.peek(1)?, stack.peek(0)?)),
        _ => None,
    }
}

fn truth(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

fn as_index(value: f64) -> Option<usize> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= u32::MAX as f64 {
        Some(value as usize)
    } else {
        None
    }
}

// CharString number parsing functions
fn parse_int1(op: u8) -> f64 {
    f64::from(i16::from(op) - 139)
}

fn parse_int2(op: u8, s: &mut ReadCtxt<'_>) -> Result<f64, ReadEof> {
    let b1 = s.read_u8()?;
    let n = (i16::from(op) - 247) * 256 + i16::from(b1) + 108;
    debug_assert!((108..=1131).contains(&n));
    Ok(f64::from(n))
}

fn parse_int3(op: u8, s: &mut ReadCtxt<'_>) -> Result<f64, ReadEof> {
    let b1 = s.read_u8()?;
    let n = -(i16::from(op) - 251) * 256 - i16::from(b1) - 108;
    debug_assert!((-1131..=-108).contains(&n));
    Ok(f64::from(n))
}

// Conversions from biased subr index operands to unbiased value
fn conv_subroutine_index(index: f64, bias: i32) -> Option<usize> {
    if !index.is_finite() || index.fract() != 0.0 {
        return None;
    }
    let index = (index as i64).checked_add(i64::from(bias))?;
    usize::try_from(index).ok()
}

/// The bias added to a subroutine call operand for a subroutine INDEX holding `count` entries.
pub fn subr_bias(charstring_type: CharstringType, count: usize) -> i32 {
    match charstring_type {
        CharstringType::Type1 => 0,
        CharstringType::Type2 => i32::from(calc_subroutine_bias(count)),
    }
}

// Adobe Technical Note #5176, Chapter 16 "Local / Global Subrs INDEXes"
pub(crate) fn calc_subroutine_bias(len: usize) -> u16 {
    if len < 1240 {
        107
    } else if len < 33900 {
        1131
    } else {
        32768
    }
}

impl From<ReadEof> for Interrupt {
    fn from(_error: ReadEof) -> Self {
        Interrupt::Truncated
    }
}

impl From<StackOverflow> for Interrupt {
    fn from(_error: StackOverflow) -> Self {
        Interrupt::StackOverflow
    }
}

impl fmt::Display for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interrupt::Truncated => write!(f, "charstring ends inside an operand or mask"),
            Interrupt::StackOverflow => write!(f, "operand stack overflow"),
            Interrupt::StackUnderflow => write!(f, "operand stack underflow"),
        }
    }
}

impl fmt::Display for SubroutineIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubroutineIndex::Local => write!(f, "local subroutine"),
            SubroutineIndex::Global => write!(f, "global subroutine"),
        }
    }
}

/// Operators defined in Adobe Technical Note #5177, The Type 2 Charstring Format.
pub(crate) mod operator {
    pub const HORIZONTAL_STEM: u8 = 1;
    pub const VERTICAL_STEM: u8 = 3;
    pub const CALL_LOCAL_SUBROUTINE: u8 = 10;
    pub const RETURN: u8 = 11;
    pub const ENDCHAR: u8 = 14;
    pub const HORIZONTAL_STEM_HINT_MASK: u8 = 18;
    pub const HINT_MASK: u8 = 19;
    pub const COUNTER_MASK: u8 = 20;
    pub const VERTICAL_STEM_HINT_MASK: u8 = 23;
    pub const SHORT_INT: u8 = 28;
    pub const CALL_GLOBAL_SUBROUTINE: u8 = 29;
    pub const FIXED_16_16: u8 = 255;

    // Two byte operators, following 12
    pub const AND: u8 = 3;
    pub const OR: u8 = 4;
    pub const NOT: u8 = 5;
    pub const ABS: u8 = 9;
    pub const ADD: u8 = 10;
    pub const SUB: u8 = 11;
    pub const DIV: u8 = 12;
    pub const NEG: u8 = 14;
    pub const EQ: u8 = 15;
    pub const CALL_OTHERSUBR: u8 = 16; // Type 1
    pub const POP: u8 = 17; // Type 1
    pub const DROP: u8 = 18;
    pub const PUT: u8 = 20;
    pub const GET: u8 = 21;
    pub const IFELSE: u8 = 22;
    pub const RANDOM: u8 = 23;
    pub const MUL: u8 = 24;
    pub const SQRT: u8 = 26;
    pub const DUP: u8 = 27;
    pub const EXCH: u8 = 28;
    pub const INDEX: u8 = 29;
    pub const ROLL: u8 = 30;
}
