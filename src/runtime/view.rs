//! One-level structural views of guest cells, and structural equality.
//!
//! [`Region::view`] decomposes a cell into a [`TaggedView`]: reference
//! fields become erased handles, atomic payloads become [`GuestVector`]s
//! aliasing the guest buffer, and cell vectors become [`HandleVector`]s.
//!
//! # Execution discipline
//!
//! Views are snapshots of identity, not of contents. A view taken before
//! guest code runs and one taken after agree only if that code did not
//! mutate the cells involved: a `GuestVector` sees writes to the buffer it
//! aliases, and a field handle keeps pointing at the cell that was in the
//! field when the view was taken. Field and element handles are protected
//! through their parent only; if guest code replaces a field, the handle to
//! the old occupant is no longer protected. Nothing checks this. Run
//! sessions with `gc_torture` to surface such mistakes at the first
//! allocation.

use std::{fmt, marker::PhantomData, rc::Rc};

use rayon::prelude::*;

use crate::{
    error::BridgeError,
    runtime::{
        form::{Form, FormMarker},
        gc::{
            cell_ref::CellRef,
            guest_object::{GuestObject, VectorData, truelength},
        },
        handle::Handle,
        region::Region,
        value::{Complex, Element, Logical},
    },
};

/// Vectors at least this long are compared on the rayon pool.
const PARALLEL_EQ_THRESHOLD: usize = 1 << 15;
const PARALLEL_EQ_CHUNK: usize = 1 << 12;

/// Live view of an atomic guest vector.
///
/// Shares the guest buffer: [`set`](Self::set) writes are visible to the
/// guest, and guest writes are visible here.
pub struct GuestVector<'r, T: Element> {
    data: VectorData<T>,
    _region: PhantomData<fn(&'r ()) -> &'r ()>,
}

impl<'r, T: Element> GuestVector<'r, T> {
    pub(crate) fn new(data: VectorData<T>) -> Self {
        Self {
            data,
            _region: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.data.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.borrow().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.data.borrow().get(index).copied()
    }

    /// Overwrites element `index` in place.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn set(&self, index: usize, value: T) {
        let mut data = self.data.borrow_mut();
        let len = data.len();
        match data.get_mut(index) {
            Some(slot) => *slot = value,
            None => panic!("GuestVector::set: index {} out of bounds for length {}", index, len),
        }
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.data.borrow().clone()
    }

    pub fn with_slice<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.data.borrow())
    }

    /// Returns whether both views alias the same buffer.
    pub fn ptr_eq(&self, other: &GuestVector<'_, T>) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }
}

impl<T: Element> Clone for GuestVector<'_, T> {
    fn clone(&self) -> Self {
        Self::new(Rc::clone(&self.data))
    }
}

impl<T: Element> PartialEq for GuestVector<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || same_elements(&self.data.borrow(), &other.data.borrow())
    }
}

impl<T: Element> Eq for GuestVector<'_, T> {}

impl<T: Element> fmt::Debug for GuestVector<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", T::FORM)?;
        f.debug_list().entries(self.data.borrow().iter()).finish()
    }
}

fn same_elements<T: Element>(a: &[T], b: &[T]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    if a.len() < PARALLEL_EQ_THRESHOLD {
        return a.iter().zip(b).all(|(x, y)| x.same(y));
    }
    a.par_chunks(PARALLEL_EQ_CHUNK)
        .zip(b.par_chunks(PARALLEL_EQ_CHUNK))
        .all(|(xs, ys)| xs.iter().zip(ys).all(|(x, y)| x.same(y)))
}

/// View of a character, generic or expression vector.
///
/// Elements compare by identity. `Char` cells are interned, so two
/// character vectors with equal text compare equal.
pub struct HandleVector<'r> {
    data: VectorData<CellRef>,
    epoch: u64,
    session: u64,
    _region: PhantomData<fn(&'r ()) -> &'r ()>,
}

impl<'r> HandleVector<'r> {
    pub fn len(&self) -> usize {
        self.data.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.borrow().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Handle<'r>> {
        let cell = self.data.borrow().get(index).copied()?;
        Some(Handle::new(cell, self.epoch, self.session))
    }

    pub fn to_vec(&self) -> Vec<Handle<'r>> {
        self.data
            .borrow()
            .iter()
            .map(|cell| Handle::new(*cell, self.epoch, self.session))
            .collect()
    }

    fn cells(&self) -> Vec<CellRef> {
        self.data.borrow().clone()
    }
}

impl Clone for HandleVector<'_> {
    fn clone(&self) -> Self {
        Self {
            data: Rc::clone(&self.data),
            epoch: self.epoch,
            session: self.session,
            _region: PhantomData,
        }
    }
}

impl PartialEq for HandleVector<'_> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.data, &other.data) || *self.data.borrow() == *other.data.borrow()
    }
}

impl Eq for HandleVector<'_> {}

impl fmt::Debug for HandleVector<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.data.borrow().iter().map(|c| (c.index(), c.generation())))
            .finish()
    }
}

/// One-level decomposition of a guest cell.
///
/// Two views are equal when they have the same variant and equal fields:
/// handles by identity, atomic vectors by contents (floats bitwise, so `NA`
/// and `NaN` equal themselves), cell vectors element by element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaggedView<'r> {
    Nil,
    Symbol {
        pname: Handle<'r>,
        value: Handle<'r>,
        internal: Handle<'r>,
    },
    List {
        car: Handle<'r>,
        cdr: Handle<'r>,
        tag: Handle<'r>,
    },
    Closure {
        formals: Handle<'r>,
        body: Handle<'r>,
        env: Handle<'r>,
    },
    Env {
        frame: Handle<'r>,
        enclos: Handle<'r>,
        hashtab: Handle<'r>,
    },
    Promise {
        value: Handle<'r>,
        expr: Handle<'r>,
        env: Handle<'r>,
    },
    Lang {
        fun: Handle<'r>,
        args: Handle<'r>,
    },
    Special {
        offset: i32,
    },
    Builtin {
        offset: i32,
    },
    Char(Rc<str>),
    Logical(GuestVector<'r, Logical>),
    Int(GuestVector<'r, i32>),
    Real(GuestVector<'r, f64>),
    Complex(GuestVector<'r, Complex>),
    String(HandleVector<'r>),
    DotDotDot {
        args: Handle<'r>,
    },
    Vector(HandleVector<'r>),
    Expr(HandleVector<'r>),
    Bytecode {
        code: Handle<'r>,
        consts: Handle<'r>,
    },
    ExtPtr {
        addr: usize,
        prot: Handle<'r>,
        tag: Handle<'r>,
    },
    WeakRef {
        key: Handle<'r>,
        value: Handle<'r>,
        finalizer: Handle<'r>,
        next: Handle<'r>,
    },
    Raw(GuestVector<'r, u8>),
    S4 {
        tagval: Handle<'r>,
    },
    Unrecognized {
        code: u8,
    },
}

impl TaggedView<'_> {
    pub fn form(&self) -> Form {
        match self {
            TaggedView::Nil => Form::Nil,
            TaggedView::Symbol { .. } => Form::Symbol,
            TaggedView::List { .. } => Form::List,
            TaggedView::Closure { .. } => Form::Closure,
            TaggedView::Env { .. } => Form::Env,
            TaggedView::Promise { .. } => Form::Promise,
            TaggedView::Lang { .. } => Form::Lang,
            TaggedView::Special { .. } => Form::Special,
            TaggedView::Builtin { .. } => Form::Builtin,
            TaggedView::Char(_) => Form::Char,
            TaggedView::Logical(_) => Form::Logical,
            TaggedView::Int(_) => Form::Int,
            TaggedView::Real(_) => Form::Real,
            TaggedView::Complex(_) => Form::Complex,
            TaggedView::String(_) => Form::String,
            TaggedView::DotDotDot { .. } => Form::DotDotDot,
            TaggedView::Vector(_) => Form::Vector,
            TaggedView::Expr(_) => Form::Expr,
            TaggedView::Bytecode { .. } => Form::Bytecode,
            TaggedView::ExtPtr { .. } => Form::ExtPtr,
            TaggedView::WeakRef { .. } => Form::WeakRef,
            TaggedView::Raw(_) => Form::Raw,
            TaggedView::S4 { .. } => Form::S4,
            TaggedView::Unrecognized { code } => Form::Other(*code),
        }
    }
}

impl<'r> Region<'r> {
    /// Decomposes `handle` one level deep.
    pub fn view<F: FormMarker>(&self, handle: Handle<'r, F>) -> TaggedView<'r> {
        let h = |cell: &CellRef| -> Handle<'r> { self.handle(*cell) };
        let cells = |data: &VectorData<CellRef>| HandleVector {
            data: Rc::clone(data),
            epoch: self.epoch(),
            session: self.session().id(),
            _region: PhantomData,
        };

        let heap = self.session().heap();
        match heap.get(self.cell_of(handle)) {
            GuestObject::Nil => TaggedView::Nil,
            GuestObject::Symbol {
                pname,
                value,
                internal,
            } => TaggedView::Symbol {
                pname: h(pname),
                value: h(value),
                internal: h(internal),
            },
            GuestObject::List { car, cdr, tag } => TaggedView::List {
                car: h(car),
                cdr: h(cdr),
                tag: h(tag),
            },
            GuestObject::Closure { formals, body, env } => TaggedView::Closure {
                formals: h(formals),
                body: h(body),
                env: h(env),
            },
            GuestObject::Env {
                frame,
                enclos,
                hashtab,
            } => TaggedView::Env {
                frame: h(frame),
                enclos: h(enclos),
                hashtab: h(hashtab),
            },
            GuestObject::Promise { value, expr, env } => TaggedView::Promise {
                value: h(value),
                expr: h(expr),
                env: h(env),
            },
            GuestObject::Lang { fun, args } => TaggedView::Lang {
                fun: h(fun),
                args: h(args),
            },
            GuestObject::Special { offset } => TaggedView::Special { offset: *offset },
            GuestObject::Builtin { offset } => TaggedView::Builtin { offset: *offset },
            GuestObject::Char(text) => TaggedView::Char(Rc::clone(text)),
            GuestObject::Logical(data) => TaggedView::Logical(GuestVector::new(Rc::clone(data))),
            GuestObject::Int(data) => TaggedView::Int(GuestVector::new(Rc::clone(data))),
            GuestObject::Real(data) => TaggedView::Real(GuestVector::new(Rc::clone(data))),
            GuestObject::Complex(data) => TaggedView::Complex(GuestVector::new(Rc::clone(data))),
            GuestObject::String(data) => TaggedView::String(cells(data)),
            GuestObject::DotDotDot { args } => TaggedView::DotDotDot { args: h(args) },
            GuestObject::Vector { elements, .. } => TaggedView::Vector(cells(elements)),
            GuestObject::Expr { elements, .. } => TaggedView::Expr(cells(elements)),
            GuestObject::Bytecode { code, consts } => TaggedView::Bytecode {
                code: h(code),
                consts: h(consts),
            },
            GuestObject::ExtPtr { addr, prot, tag } => TaggedView::ExtPtr {
                addr: *addr,
                prot: h(prot),
                tag: h(tag),
            },
            GuestObject::WeakRef {
                key,
                value,
                finalizer,
                next,
            } => TaggedView::WeakRef {
                key: h(key),
                value: h(value),
                finalizer: h(finalizer),
                next: h(next),
            },
            GuestObject::Raw(data) => TaggedView::Raw(GuestVector::new(Rc::clone(data))),
            GuestObject::S4 { tagval } => TaggedView::S4 { tagval: h(tagval) },
            GuestObject::Other { code } => TaggedView::Unrecognized { code: *code },
        }
    }

    /// Builds a new cell from a view.
    ///
    /// Atomic payloads are copied, so the new cell does not alias the
    /// viewed one. Symbols and `Char` cells are interned and come back as
    /// the existing cell. `Unrecognized` is only accepted for codes outside
    /// the known form table.
    pub fn unview(&self, view: &TaggedView<'r>) -> Result<Handle<'r>, BridgeError> {
        let c = |h: &Handle<'r>| self.cell_of(*h);
        let object = match view {
            TaggedView::Nil => return Ok(self.nil().erase()),
            TaggedView::Symbol { pname, .. } => {
                let name = match self.view(*pname) {
                    TaggedView::Char(text) => text,
                    other => return Err(BridgeError::type_mismatch(Form::Char, other.form())),
                };
                return Ok(self.install(&name).erase());
            }
            TaggedView::Char(text) => return Ok(self.mk_char(text).erase()),
            TaggedView::List { car, cdr, tag } => GuestObject::List {
                car: c(car),
                cdr: c(cdr),
                tag: c(tag),
            },
            TaggedView::Closure { formals, body, env } => GuestObject::Closure {
                formals: c(formals),
                body: c(body),
                env: c(env),
            },
            TaggedView::Env {
                frame,
                enclos,
                hashtab,
            } => GuestObject::Env {
                frame: c(frame),
                enclos: c(enclos),
                hashtab: c(hashtab),
            },
            TaggedView::Promise { value, expr, env } => GuestObject::Promise {
                value: c(value),
                expr: c(expr),
                env: c(env),
            },
            TaggedView::Lang { fun, args } => GuestObject::Lang {
                fun: c(fun),
                args: c(args),
            },
            TaggedView::Special { offset } => GuestObject::Special { offset: *offset },
            TaggedView::Builtin { offset } => GuestObject::Builtin { offset: *offset },
            TaggedView::Logical(v) => Logical::into_object(v.to_vec()),
            TaggedView::Int(v) => i32::into_object(v.to_vec()),
            TaggedView::Real(v) => f64::into_object(v.to_vec()),
            TaggedView::Complex(v) => Complex::into_object(v.to_vec()),
            TaggedView::Raw(v) => u8::into_object(v.to_vec()),
            TaggedView::String(v) => GuestObject::String(shared(v.cells())),
            TaggedView::DotDotDot { args } => GuestObject::DotDotDot { args: c(args) },
            TaggedView::Vector(v) => GuestObject::Vector {
                truelength: truelength(v.len()),
                elements: shared(v.cells()),
            },
            TaggedView::Expr(v) => GuestObject::Expr {
                truelength: truelength(v.len()),
                elements: shared(v.cells()),
            },
            TaggedView::Bytecode { code, consts } => GuestObject::Bytecode {
                code: c(code),
                consts: c(consts),
            },
            TaggedView::ExtPtr { addr, prot, tag } => GuestObject::ExtPtr {
                addr: *addr,
                prot: c(prot),
                tag: c(tag),
            },
            TaggedView::WeakRef {
                key,
                value,
                finalizer,
                next,
            } => GuestObject::WeakRef {
                key: c(key),
                value: c(value),
                finalizer: c(finalizer),
                next: c(next),
            },
            TaggedView::S4 { tagval } => GuestObject::S4 { tagval: c(tagval) },
            TaggedView::Unrecognized { code } => match Form::from_code(*code) {
                Form::Other(code) => GuestObject::Other { code },
                known => return Err(BridgeError::type_mismatch(Form::Other(*code), known)),
            },
        };
        Ok(self.alloc(object))
    }

    /// Structural equality of two handles of possibly different static
    /// forms. Cells of different forms are never equal.
    pub fn heq<F: FormMarker, G: FormMarker>(&self, a: Handle<'r, F>, b: Handle<'r, G>) -> bool {
        a == b || self.view(a) == self.view(b)
    }

    /// Zero-copy view of an atomic vector.
    pub fn alias<T: Element, F: FormMarker>(
        &self,
        handle: Handle<'r, F>,
    ) -> Result<GuestVector<'r, T>, BridgeError> {
        self.vector_data::<T, F>(handle).map(GuestVector::new)
    }

    pub(crate) fn vector_data<T: Element, F: FormMarker>(
        &self,
        handle: Handle<'r, F>,
    ) -> Result<VectorData<T>, BridgeError> {
        let heap = self.session().heap();
        let object = heap.get(self.cell_of(handle));
        T::unwrap(object)
            .map(Rc::clone)
            .ok_or_else(|| BridgeError::type_mismatch(T::FORM, object.form()))
    }
}

fn shared<T>(data: Vec<T>) -> VectorData<T> {
    Rc::new(std::cell::RefCell::new(data))
}
