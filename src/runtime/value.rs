//! Scalar element types stored in atomic guest vectors.
//!
//! The guest has no scalars: a number is a vector of length one. Each
//! element type knows its vector [`Form`] and its missing-value (`NA`)
//! sentinel.

use std::{cell::RefCell, fmt, rc::Rc};

use serde::{Deserialize, Serialize};

use crate::runtime::{
    form::{Form, FormMarker, forms},
    gc::guest_object::{GuestObject, VectorData},
};

/// Integer `NA`.
pub const NA_INTEGER: i32 = i32::MIN;

/// Low word of the NaN payload the guest uses to mark a real `NA`.
const NA_REAL_PAYLOAD: u64 = 1954;

/// Real `NA`: a NaN whose low word is 1954.
pub fn na_real() -> f64 {
    f64::from_bits(0x7FF0_0000_0000_0000 | NA_REAL_PAYLOAD)
}

pub fn is_na_real(value: f64) -> bool {
    value.is_nan() && (value.to_bits() & 0xFFFF_FFFF) == NA_REAL_PAYLOAD
}

/// Three-valued guest logical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Logical {
    False,
    True,
    Na,
}

impl Logical {
    pub fn to_bool(self) -> Option<bool> {
        match self {
            Logical::False => Some(false),
            Logical::True => Some(true),
            Logical::Na => None,
        }
    }
}

impl From<bool> for Logical {
    fn from(value: bool) -> Self {
        if value { Logical::True } else { Logical::False }
    }
}

impl fmt::Display for Logical {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Logical::False => f.write_str("FALSE"),
            Logical::True => f.write_str("TRUE"),
            Logical::Na => f.write_str("NA"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    pub fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }
}

impl fmt::Display for Complex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.im < 0.0 {
            write!(f, "{}-{}i", self.re, -self.im)
        } else {
            write!(f, "{}+{}i", self.re, self.im)
        }
    }
}

/// Element type of an atomic guest vector.
pub trait Element: Copy + Send + Sync + fmt::Debug + 'static {
    const FORM: Form;
    /// Type-level tag of the vector form.
    type Marker: FormMarker;

    /// Identity comparison used by structural equality.
    ///
    /// Floats compare by bit pattern, so `NA` equals `NA` and the relation
    /// stays an equivalence.
    fn same(&self, other: &Self) -> bool;

    fn is_na(&self) -> bool;

    fn into_object(data: Vec<Self>) -> GuestObject {
        Self::wrap(Rc::new(RefCell::new(data)))
    }

    fn wrap(data: VectorData<Self>) -> GuestObject;

    fn unwrap(object: &GuestObject) -> Option<&VectorData<Self>>;
}

impl Element for Logical {
    const FORM: Form = Form::Logical;
    type Marker = forms::Logical;

    fn same(&self, other: &Self) -> bool {
        self == other
    }

    fn is_na(&self) -> bool {
        *self == Logical::Na
    }

    fn wrap(data: VectorData<Self>) -> GuestObject {
        GuestObject::Logical(data)
    }

    fn unwrap(object: &GuestObject) -> Option<&VectorData<Self>> {
        match object {
            GuestObject::Logical(data) => Some(data),
            _ => None,
        }
    }
}

impl Element for i32 {
    const FORM: Form = Form::Int;
    type Marker = forms::Int;

    fn same(&self, other: &Self) -> bool {
        self == other
    }

    fn is_na(&self) -> bool {
        *self == NA_INTEGER
    }

    fn wrap(data: VectorData<Self>) -> GuestObject {
        GuestObject::Int(data)
    }

    fn unwrap(object: &GuestObject) -> Option<&VectorData<Self>> {
        match object {
            GuestObject::Int(data) => Some(data),
            _ => None,
        }
    }
}

impl Element for f64 {
    const FORM: Form = Form::Real;
    type Marker = forms::Real;

    fn same(&self, other: &Self) -> bool {
        self.to_bits() == other.to_bits()
    }

    fn is_na(&self) -> bool {
        is_na_real(*self)
    }

    fn wrap(data: VectorData<Self>) -> GuestObject {
        GuestObject::Real(data)
    }

    fn unwrap(object: &GuestObject) -> Option<&VectorData<Self>> {
        match object {
            GuestObject::Real(data) => Some(data),
            _ => None,
        }
    }
}

impl Element for Complex {
    const FORM: Form = Form::Complex;
    type Marker = forms::Complex;

    fn same(&self, other: &Self) -> bool {
        self.re.to_bits() == other.re.to_bits() && self.im.to_bits() == other.im.to_bits()
    }

    fn is_na(&self) -> bool {
        is_na_real(self.re) || is_na_real(self.im)
    }

    fn wrap(data: VectorData<Self>) -> GuestObject {
        GuestObject::Complex(data)
    }

    fn unwrap(object: &GuestObject) -> Option<&VectorData<Self>> {
        match object {
            GuestObject::Complex(data) => Some(data),
            _ => None,
        }
    }
}

impl Element for u8 {
    const FORM: Form = Form::Raw;
    type Marker = forms::Raw;

    fn same(&self, other: &Self) -> bool {
        self == other
    }

    fn is_na(&self) -> bool {
        false
    }

    fn wrap(data: VectorData<Self>) -> GuestObject {
        GuestObject::Raw(data)
    }

    fn unwrap(object: &GuestObject) -> Option<&VectorData<Self>> {
        match object {
            GuestObject::Raw(data) => Some(data),
            _ => None,
        }
    }
}
