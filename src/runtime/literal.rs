//! Conversions between host literals and guest cells.
//!
//! | host | guest |
//! |---|---|
//! | `f64`, `Vec<f64>`, `&[f64]`, `Option<f64>` | double |
//! | `i32`, `Vec<i32>`, `&[i32]`, `Option<i32>` | integer |
//! | `bool`, `Logical`, `Vec<bool>`, `Vec<Logical>`, `Option<bool>` | logical |
//! | `Complex`, `Vec<Complex>` | complex |
//! | `Vec<u8>`, `&[u8]` | raw |
//! | `String`, `&str`, `Vec<String>`, `Option<String>`, `Vec<Option<String>>` | character |
//! | `()` | `NULL` |
//!
//! Owned vectors are moved into the guest cell without copying their
//! buffer. Slices are copied.
//!
//! Scalars decode from length-one vectors only. `Option` scalars decode
//! `NA` to `None`; plain `bool` and `String` refuse it with `MissingValue`.
//! `f64` and `i32` carry their `NA` sentinels through unchanged.

use crate::{
    error::BridgeError,
    runtime::{
        form::{Form, FormMarker, forms},
        gc::guest_object::GuestObject,
        handle::Handle,
        region::Region,
        value::{Complex, Element, Logical, NA_INTEGER, na_real},
    },
};

/// Host values that can be written into the guest heap.
pub trait Encode {
    type Form: FormMarker;

    fn encode<'r>(self, region: &Region<'r>) -> Handle<'r, Self::Form>;
}

/// Host values that can be read back from a guest cell.
pub trait Decode: Sized {
    fn decode<'r, F: FormMarker>(region: &Region<'r>, handle: Handle<'r, F>)
    -> Result<Self, BridgeError>;
}

/// Types with a mapping in both directions.
pub trait Literal: Encode + Decode {}

impl<T: Encode + Decode> Literal for T {}

impl<'r> Region<'r> {
    pub fn encode<T: Encode>(&self, value: T) -> Handle<'r, T::Form> {
        value.encode(self)
    }

    pub fn decode<T: Decode, F: FormMarker>(&self, handle: Handle<'r, F>) -> Result<T, BridgeError> {
        T::decode(self, handle)
    }

    /// Moves `data` into a new atomic vector cell.
    pub fn alloc_vector<T: Element>(&self, data: Vec<T>) -> Handle<'r, T::Marker> {
        self.alloc(T::into_object(data))
    }
}

fn scalar<'r, T: Element, F: FormMarker>(
    region: &Region<'r>,
    handle: Handle<'r, F>,
) -> Result<T, BridgeError> {
    let data = region.vector_data::<T, F>(handle)?;
    let data = data.borrow();
    match data.as_slice() {
        [value] => Ok(*value),
        other => Err(BridgeError::LengthMismatch {
            expected: 1,
            actual: other.len(),
        }),
    }
}

fn elements<'r, T: Element, F: FormMarker>(
    region: &Region<'r>,
    handle: Handle<'r, F>,
) -> Result<Vec<T>, BridgeError> {
    Ok(region.vector_data::<T, F>(handle)?.borrow().clone())
}

macro_rules! atomic_literal {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Encode for $ty {
                type Form = <$ty as Element>::Marker;

                fn encode<'r>(self, region: &Region<'r>) -> Handle<'r, Self::Form> {
                    region.alloc_vector(vec![self])
                }
            }

            impl Decode for $ty {
                fn decode<'r, F: FormMarker>(
                    region: &Region<'r>,
                    handle: Handle<'r, F>,
                ) -> Result<Self, BridgeError> {
                    scalar(region, handle)
                }
            }

            impl Encode for Vec<$ty> {
                type Form = <$ty as Element>::Marker;

                fn encode<'r>(self, region: &Region<'r>) -> Handle<'r, Self::Form> {
                    region.alloc_vector(self)
                }
            }

            impl Decode for Vec<$ty> {
                fn decode<'r, F: FormMarker>(
                    region: &Region<'r>,
                    handle: Handle<'r, F>,
                ) -> Result<Self, BridgeError> {
                    elements(region, handle)
                }
            }

            impl Encode for &[$ty] {
                type Form = <$ty as Element>::Marker;

                fn encode<'r>(self, region: &Region<'r>) -> Handle<'r, Self::Form> {
                    region.alloc_vector(self.to_vec())
                }
            }
        )*
    };
}

atomic_literal!(f64, i32, Logical, Complex, u8);

impl Encode for bool {
    type Form = forms::Logical;

    fn encode<'r>(self, region: &Region<'r>) -> Handle<'r, forms::Logical> {
        Logical::from(self).encode(region)
    }
}

impl Decode for bool {
    fn decode<'r, F: FormMarker>(region: &Region<'r>, handle: Handle<'r, F>) -> Result<Self, BridgeError> {
        scalar::<Logical, F>(region, handle)?
            .to_bool()
            .ok_or(BridgeError::MissingValue {
                form: Form::Logical,
            })
    }
}

impl Encode for Vec<bool> {
    type Form = forms::Logical;

    fn encode<'r>(self, region: &Region<'r>) -> Handle<'r, forms::Logical> {
        region.alloc_vector(self.into_iter().map(Logical::from).collect())
    }
}

impl Decode for Vec<bool> {
    fn decode<'r, F: FormMarker>(region: &Region<'r>, handle: Handle<'r, F>) -> Result<Self, BridgeError> {
        elements::<Logical, F>(region, handle)?
            .into_iter()
            .map(|value| {
                value.to_bool().ok_or(BridgeError::MissingValue {
                    form: Form::Logical,
                })
            })
            .collect()
    }
}

impl Encode for Option<bool> {
    type Form = forms::Logical;

    fn encode<'r>(self, region: &Region<'r>) -> Handle<'r, forms::Logical> {
        self.map_or(Logical::Na, Logical::from).encode(region)
    }
}

impl Decode for Option<bool> {
    fn decode<'r, F: FormMarker>(region: &Region<'r>, handle: Handle<'r, F>) -> Result<Self, BridgeError> {
        Ok(scalar::<Logical, F>(region, handle)?.to_bool())
    }
}

impl Encode for Option<f64> {
    type Form = forms::Real;

    fn encode<'r>(self, region: &Region<'r>) -> Handle<'r, forms::Real> {
        self.unwrap_or_else(na_real).encode(region)
    }
}

impl Decode for Option<f64> {
    fn decode<'r, F: FormMarker>(region: &Region<'r>, handle: Handle<'r, F>) -> Result<Self, BridgeError> {
        let value = scalar::<f64, F>(region, handle)?;
        Ok((!value.is_na()).then_some(value))
    }
}

impl Encode for Option<i32> {
    type Form = forms::Int;

    fn encode<'r>(self, region: &Region<'r>) -> Handle<'r, forms::Int> {
        self.unwrap_or(NA_INTEGER).encode(region)
    }
}

impl Decode for Option<i32> {
    fn decode<'r, F: FormMarker>(region: &Region<'r>, handle: Handle<'r, F>) -> Result<Self, BridgeError> {
        let value = scalar::<i32, F>(region, handle)?;
        Ok((!value.is_na()).then_some(value))
    }
}

// -- Character vectors --

/// Reads a character vector (or a single `Char` cell) as optional strings.
fn strings<'r, F: FormMarker>(
    region: &Region<'r>,
    handle: Handle<'r, F>,
) -> Result<Vec<Option<String>>, BridgeError> {
    let session = region.session();
    let heap = session.heap();
    let na = heap.na_string();
    let text_of = |cell| match heap.get(cell) {
        GuestObject::Char(text) if cell != na => Some(text.to_string()),
        _ => None,
    };
    match heap.get(region.cell_of(handle)) {
        GuestObject::String(cells) => Ok(cells.borrow().iter().map(|c| text_of(*c)).collect()),
        GuestObject::Char(_) => Ok(vec![text_of(region.cell_of(handle))]),
        other => Err(BridgeError::type_mismatch(Form::String, other.form())),
    }
}

fn single_string<'r, F: FormMarker>(
    region: &Region<'r>,
    handle: Handle<'r, F>,
) -> Result<Option<String>, BridgeError> {
    let mut items = strings(region, handle)?;
    match items.len() {
        1 => Ok(items.remove(0)),
        actual => Err(BridgeError::LengthMismatch {
            expected: 1,
            actual,
        }),
    }
}

fn missing_string() -> BridgeError {
    BridgeError::MissingValue { form: Form::String }
}

impl Encode for &str {
    type Form = forms::String;

    fn encode<'r>(self, region: &Region<'r>) -> Handle<'r, forms::String> {
        region.mk_string(self)
    }
}

impl Encode for String {
    type Form = forms::String;

    fn encode<'r>(self, region: &Region<'r>) -> Handle<'r, forms::String> {
        region.mk_string(&self)
    }
}

impl Decode for String {
    fn decode<'r, F: FormMarker>(region: &Region<'r>, handle: Handle<'r, F>) -> Result<Self, BridgeError> {
        single_string(region, handle)?.ok_or_else(missing_string)
    }
}

impl Encode for Option<String> {
    type Form = forms::String;

    fn encode<'r>(self, region: &Region<'r>) -> Handle<'r, forms::String> {
        region.mk_strings([self.as_deref()])
    }
}

impl Decode for Option<String> {
    fn decode<'r, F: FormMarker>(region: &Region<'r>, handle: Handle<'r, F>) -> Result<Self, BridgeError> {
        single_string(region, handle)
    }
}

impl Encode for Vec<String> {
    type Form = forms::String;

    fn encode<'r>(self, region: &Region<'r>) -> Handle<'r, forms::String> {
        region.mk_strings(self.iter().map(|s| Some(s.as_str())))
    }
}

impl Decode for Vec<String> {
    fn decode<'r, F: FormMarker>(region: &Region<'r>, handle: Handle<'r, F>) -> Result<Self, BridgeError> {
        strings(region, handle)?
            .into_iter()
            .map(|item| item.ok_or_else(missing_string))
            .collect()
    }
}

impl Encode for Vec<Option<String>> {
    type Form = forms::String;

    fn encode<'r>(self, region: &Region<'r>) -> Handle<'r, forms::String> {
        region.mk_strings(self.iter().map(|s| s.as_deref()))
    }
}

impl Decode for Vec<Option<String>> {
    fn decode<'r, F: FormMarker>(region: &Region<'r>, handle: Handle<'r, F>) -> Result<Self, BridgeError> {
        strings(region, handle)
    }
}

impl Encode for () {
    type Form = forms::Nil;

    fn encode<'r>(self, region: &Region<'r>) -> Handle<'r, forms::Nil> {
        region.nil()
    }
}

impl Decode for () {
    fn decode<'r, F: FormMarker>(region: &Region<'r>, handle: Handle<'r, F>) -> Result<Self, BridgeError> {
        match region.form_of(handle) {
            Form::Nil => Ok(()),
            actual => Err(BridgeError::type_mismatch(Form::Nil, actual)),
        }
    }
}
