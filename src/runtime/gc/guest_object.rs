use std::{cell::RefCell, rc::Rc};

use crate::runtime::{
    form::Form,
    gc::cell_ref::CellRef,
    value::{Complex, Logical},
};

/// Shared backing store of a vector cell.
///
/// The buffer is reference counted so a host-side view can alias it without
/// copying; writes through either side are visible to the other.
pub type VectorData<T> = Rc<RefCell<Vec<T>>>;

/// Payload of a guest cell. The variant is the cell's form and never changes
/// after allocation; only the payload contents may be mutated.
#[derive(Debug, Clone)]
pub enum GuestObject {
    Nil,
    Symbol {
        pname: CellRef,
        value: CellRef,
        internal: CellRef,
    },
    /// Pairlist cell.
    List {
        car: CellRef,
        cdr: CellRef,
        tag: CellRef,
    },
    Closure {
        formals: CellRef,
        body: CellRef,
        env: CellRef,
    },
    Env {
        frame: CellRef,
        enclos: CellRef,
        hashtab: CellRef,
    },
    Promise {
        value: CellRef,
        expr: CellRef,
        env: CellRef,
    },
    /// Call cell: `fun` applied to the pairlist `args`.
    Lang {
        fun: CellRef,
        args: CellRef,
    },
    Special {
        offset: i32,
    },
    Builtin {
        offset: i32,
    },
    Char(Rc<str>),
    Logical(VectorData<Logical>),
    Int(VectorData<i32>),
    Real(VectorData<f64>),
    Complex(VectorData<Complex>),
    /// Character vector; elements are `Char` cells.
    String(VectorData<CellRef>),
    DotDotDot {
        args: CellRef,
    },
    Vector {
        truelength: i32,
        elements: VectorData<CellRef>,
    },
    Expr {
        truelength: i32,
        elements: VectorData<CellRef>,
    },
    Bytecode {
        code: CellRef,
        consts: CellRef,
    },
    ExtPtr {
        addr: usize,
        prot: CellRef,
        tag: CellRef,
    },
    WeakRef {
        key: CellRef,
        value: CellRef,
        finalizer: CellRef,
        next: CellRef,
    },
    Raw(VectorData<u8>),
    S4 {
        tagval: CellRef,
    },
    /// A form this bridge does not decode.
    Other {
        code: u8,
    },
}

/// `truelength` slot for a vector of `len` elements, saturated at the
/// guest's 32-bit limit.
pub(crate) fn truelength(len: usize) -> i32 {
    i32::try_from(len).unwrap_or(i32::MAX)
}

impl GuestObject {
    pub fn form(&self) -> Form {
        match self {
            GuestObject::Nil => Form::Nil,
            GuestObject::Symbol { .. } => Form::Symbol,
            GuestObject::List { .. } => Form::List,
            GuestObject::Closure { .. } => Form::Closure,
            GuestObject::Env { .. } => Form::Env,
            GuestObject::Promise { .. } => Form::Promise,
            GuestObject::Lang { .. } => Form::Lang,
            GuestObject::Special { .. } => Form::Special,
            GuestObject::Builtin { .. } => Form::Builtin,
            GuestObject::Char(_) => Form::Char,
            GuestObject::Logical(_) => Form::Logical,
            GuestObject::Int(_) => Form::Int,
            GuestObject::Real(_) => Form::Real,
            GuestObject::Complex(_) => Form::Complex,
            GuestObject::String(_) => Form::String,
            GuestObject::DotDotDot { .. } => Form::DotDotDot,
            GuestObject::Vector { .. } => Form::Vector,
            GuestObject::Expr { .. } => Form::Expr,
            GuestObject::Bytecode { .. } => Form::Bytecode,
            GuestObject::ExtPtr { .. } => Form::ExtPtr,
            GuestObject::WeakRef { .. } => Form::WeakRef,
            GuestObject::Raw(_) => Form::Raw,
            GuestObject::S4 { .. } => Form::S4,
            GuestObject::Other { code } => Form::Other(*code),
        }
    }

    /// Element count for vector forms, `None` otherwise.
    pub fn vector_len(&self) -> Option<usize> {
        match self {
            GuestObject::Char(text) => Some(text.len()),
            GuestObject::Logical(data) => Some(data.borrow().len()),
            GuestObject::Int(data) => Some(data.borrow().len()),
            GuestObject::Real(data) => Some(data.borrow().len()),
            GuestObject::Complex(data) => Some(data.borrow().len()),
            GuestObject::Raw(data) => Some(data.borrow().len()),
            GuestObject::String(data)
            | GuestObject::Vector { elements: data, .. }
            | GuestObject::Expr { elements: data, .. } => Some(data.borrow().len()),
            _ => None,
        }
    }

    /// Calls `visit` for every cell this payload references.
    pub(crate) fn for_each_child(&self, mut visit: impl FnMut(CellRef)) {
        match self {
            GuestObject::Symbol {
                pname,
                value,
                internal,
            } => {
                visit(*pname);
                visit(*value);
                visit(*internal);
            }
            GuestObject::List { car, cdr, tag } => {
                visit(*car);
                visit(*cdr);
                visit(*tag);
            }
            GuestObject::Closure { formals, body, env } => {
                visit(*formals);
                visit(*body);
                visit(*env);
            }
            GuestObject::Env {
                frame,
                enclos,
                hashtab,
            } => {
                visit(*frame);
                visit(*enclos);
                visit(*hashtab);
            }
            GuestObject::Promise { value, expr, env } => {
                visit(*value);
                visit(*expr);
                visit(*env);
            }
            GuestObject::Lang { fun, args } => {
                visit(*fun);
                visit(*args);
            }
            GuestObject::DotDotDot { args } => visit(*args),
            GuestObject::String(elements)
            | GuestObject::Vector { elements, .. }
            | GuestObject::Expr { elements, .. } => {
                for cell in elements.borrow().iter() {
                    visit(*cell);
                }
            }
            GuestObject::Bytecode { code, consts } => {
                visit(*code);
                visit(*consts);
            }
            GuestObject::ExtPtr { prot, tag, .. } => {
                visit(*prot);
                visit(*tag);
            }
            GuestObject::WeakRef {
                key,
                value,
                finalizer,
                next,
            } => {
                visit(*key);
                visit(*value);
                visit(*finalizer);
                visit(*next);
            }
            GuestObject::S4 { tagval } => visit(*tagval),
            GuestObject::Nil
            | GuestObject::Special { .. }
            | GuestObject::Builtin { .. }
            | GuestObject::Char(_)
            | GuestObject::Logical(_)
            | GuestObject::Int(_)
            | GuestObject::Real(_)
            | GuestObject::Complex(_)
            | GuestObject::Raw(_)
            | GuestObject::Other { .. } => {}
        }
    }
}

#[cfg(feature = "gc-telemetry")]
impl GuestObject {
    /// Estimates the shallow byte size of this object including vector payloads.
    pub fn shallow_size_bytes(&self) -> usize {
        use std::mem::size_of;

        let base = size_of::<Self>();
        match self {
            GuestObject::Char(text) => base + text.len(),
            GuestObject::Logical(data) => base + data.borrow().capacity() * size_of::<Logical>(),
            GuestObject::Int(data) => base + data.borrow().capacity() * size_of::<i32>(),
            GuestObject::Real(data) => base + data.borrow().capacity() * size_of::<f64>(),
            GuestObject::Complex(data) => base + data.borrow().capacity() * size_of::<Complex>(),
            GuestObject::Raw(data) => base + data.borrow().capacity(),
            GuestObject::String(data)
            | GuestObject::Vector { elements: data, .. }
            | GuestObject::Expr { elements: data, .. } => {
                base + data.borrow().capacity() * size_of::<CellRef>()
            }
            _ => base,
        }
    }
}
