//! Form tags of guest cells.
//!
//! [`Form`] is the runtime tag carried by every guest cell. The marker types
//! in [`forms`] lift a tag to the type level so a
//! [`Handle`](crate::runtime::handle::Handle) can state the shape it points
//! to. [`forms::Any`] is the marker for "shape not known statically".

use std::fmt;

use serde::{Deserialize, Serialize};

/// Runtime tag of a guest cell.
///
/// Codes follow the guest runtime's own numbering. Tags this crate does not
/// know about are kept as [`Form::Other`] rather than rejected, so newer guest
/// runtimes can hand us cells of forms introduced after this enum was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Form {
    Nil,
    Symbol,
    List,
    Closure,
    Env,
    Promise,
    Lang,
    Special,
    Builtin,
    Char,
    Logical,
    Int,
    Real,
    Complex,
    String,
    DotDotDot,
    /// Pseudo-form meaning "any shape". No cell ever carries it.
    Any,
    Vector,
    Expr,
    Bytecode,
    ExtPtr,
    WeakRef,
    Raw,
    S4,
    Other(u8),
}

impl Form {
    /// Every known form, in code order.
    pub const ALL: [Form; 24] = [
        Form::Nil,
        Form::Symbol,
        Form::List,
        Form::Closure,
        Form::Env,
        Form::Promise,
        Form::Lang,
        Form::Special,
        Form::Builtin,
        Form::Char,
        Form::Logical,
        Form::Int,
        Form::Real,
        Form::Complex,
        Form::String,
        Form::DotDotDot,
        Form::Any,
        Form::Vector,
        Form::Expr,
        Form::Bytecode,
        Form::ExtPtr,
        Form::WeakRef,
        Form::Raw,
        Form::S4,
    ];

    pub const fn code(self) -> u8 {
        match self {
            Form::Nil => 0,
            Form::Symbol => 1,
            Form::List => 2,
            Form::Closure => 3,
            Form::Env => 4,
            Form::Promise => 5,
            Form::Lang => 6,
            Form::Special => 7,
            Form::Builtin => 8,
            Form::Char => 9,
            Form::Logical => 10,
            Form::Int => 13,
            Form::Real => 14,
            Form::Complex => 15,
            Form::String => 16,
            Form::DotDotDot => 17,
            Form::Any => 18,
            Form::Vector => 19,
            Form::Expr => 20,
            Form::Bytecode => 21,
            Form::ExtPtr => 22,
            Form::WeakRef => 23,
            Form::Raw => 24,
            Form::S4 => 25,
            Form::Other(code) => code,
        }
    }

    /// Total inverse of [`Form::code`]; unknown codes become [`Form::Other`].
    pub fn from_code(code: u8) -> Form {
        Form::ALL
            .iter()
            .copied()
            .find(|form| form.code() == code)
            .unwrap_or(Form::Other(code))
    }

    /// The guest's `typeof` name for this form.
    pub fn label(self) -> &'static str {
        match self {
            Form::Nil => "NULL",
            Form::Symbol => "symbol",
            Form::List => "pairlist",
            Form::Closure => "closure",
            Form::Env => "environment",
            Form::Promise => "promise",
            Form::Lang => "language",
            Form::Special => "special",
            Form::Builtin => "builtin",
            Form::Char => "char",
            Form::Logical => "logical",
            Form::Int => "integer",
            Form::Real => "double",
            Form::Complex => "complex",
            Form::String => "character",
            Form::DotDotDot => "...",
            Form::Any => "any",
            Form::Vector => "list",
            Form::Expr => "expression",
            Form::Bytecode => "bytecode",
            Form::ExtPtr => "externalptr",
            Form::WeakRef => "weakref",
            Form::Raw => "raw",
            Form::S4 => "S4",
            Form::Other(_) => "unknown",
        }
    }

    /// Forms whose payload is a length-indexed vector.
    pub fn is_vector(self) -> bool {
        matches!(
            self,
            Form::Char
                | Form::Logical
                | Form::Int
                | Form::Real
                | Form::Complex
                | Form::String
                | Form::Vector
                | Form::Expr
                | Form::Raw
        )
    }
}

impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Form::Other(code) => write!(f, "unknown form {}", code),
            other => f.write_str(other.label()),
        }
    }
}

/// Type-level form tag.
pub trait FormMarker: 'static {
    /// `None` for [`forms::Any`].
    const FORM: Option<Form>;

    /// Returns whether a cell of `actual` form may be viewed through this marker.
    fn admits(actual: Form) -> bool {
        match Self::FORM {
            None => true,
            Some(expected) => expected == actual,
        }
    }
}

/// Marker types, one per known form.
pub mod forms {
    use super::{Form, FormMarker};

    macro_rules! form_markers {
        ($($(#[$meta:meta])* $name:ident => $form:expr),* $(,)?) => {
            $(
                $(#[$meta])*
                #[derive(Debug, Clone, Copy)]
                pub enum $name {}

                impl FormMarker for $name {
                    const FORM: Option<Form> = Some($form);
                }
            )*
        };
    }

    form_markers! {
        Nil => Form::Nil,
        Symbol => Form::Symbol,
        /// Pairlist cell.
        List => Form::List,
        Closure => Form::Closure,
        Env => Form::Env,
        Promise => Form::Promise,
        /// Call cell.
        Lang => Form::Lang,
        Special => Form::Special,
        Builtin => Form::Builtin,
        Char => Form::Char,
        Logical => Form::Logical,
        Int => Form::Int,
        Real => Form::Real,
        Complex => Form::Complex,
        /// Character vector.
        String => Form::String,
        DotDotDot => Form::DotDotDot,
        /// Generic vector.
        Vector => Form::Vector,
        Expr => Form::Expr,
        Bytecode => Form::Bytecode,
        ExtPtr => Form::ExtPtr,
        WeakRef => Form::WeakRef,
        Raw => Form::Raw,
        S4 => Form::S4,
    }

    /// Unknown shape.
    #[derive(Debug, Clone, Copy)]
    pub enum Any {}

    impl FormMarker for Any {
        const FORM: Option<Form> = None;
    }
}
