//! Regions: batched protection of guest allocations.
//!
//! A region is opened with [`Session::with_region`]. Every cell obtained
//! through the region is pushed on the guest protect stack; when the
//! outermost region body returns (or unwinds) the stack is cut back to where
//! it was, releasing all of those protections at once.
//!
//! Nested requests are flattened: an inner `with_region` joins the region
//! already open, shares its epoch, and releases nothing on exit. There is
//! never more than one protection set per session, so nothing can be
//! released twice.

use std::marker::PhantomData;

use crate::{
    error::BridgeError,
    runtime::{
        automatic::AUTOMATIC_EPOCH,
        form::{Form, FormMarker, forms},
        gc::{cell_ref::CellRef, guest_object::{GuestObject, truelength}},
        handle::{Handle, RawHandle},
        session::Session,
    },
};

/// An open region. Obtained only inside [`Session::with_region`].
///
/// `'r` is invariant: the region body is higher-ranked over it, so two
/// regions never share a lifetime and a handle from one cannot be passed to
/// another, even when the bodies are nested.
pub struct Region<'r> {
    session: &'r Session,
    epoch: u64,
    _brand: PhantomData<fn(&'r ()) -> &'r ()>,
}

impl<'r> Region<'r> {
    pub(crate) fn new(session: &'r Session, epoch: u64) -> Self {
        Self {
            session,
            epoch,
            _brand: PhantomData,
        }
    }

    pub fn session(&self) -> &'r Session {
        self.session
    }

    /// Identifier of this region; flattened nested regions share it.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Runs `body` in a nested region, which joins this one.
    pub fn nested<R>(&self, body: impl FnOnce(&Region<'_>) -> R) -> R {
        self.session.with_region(body)
    }

    pub(crate) fn handle<F: FormMarker>(&self, cell: CellRef) -> Handle<'r, F> {
        Handle::new(cell, self.epoch, self.session.id())
    }

    /// The cell behind `handle`. Debug builds check that the handle belongs
    /// to this session and region, which only fails after
    /// [`rebind_unchecked`](Self::rebind_unchecked) of a foreign handle.
    pub(crate) fn cell_of<F: FormMarker>(&self, handle: Handle<'r, F>) -> CellRef {
        debug_assert_eq!(
            handle.session(),
            self.session.id(),
            "handle used outside its session"
        );
        debug_assert_eq!(handle.epoch(), self.epoch, "handle used outside its region");
        handle.cell()
    }

    /// Protects `cell` for the rest of the region and wraps it.
    pub(crate) fn protect<F: FormMarker>(&self, cell: CellRef) -> Handle<'r, F> {
        self.session.heap_mut().protect(cell);
        self.handle(cell)
    }

    /// Allocates and protects a cell.
    ///
    /// Cells referenced by `object` must be protected already.
    pub(crate) fn alloc<F: FormMarker>(&self, object: GuestObject) -> Handle<'r, F> {
        let mut heap = self.session.heap_mut();
        let cell = heap.alloc(object);
        heap.protect(cell);
        self.handle(cell)
    }

    // -- Construction --

    pub fn nil(&self) -> Handle<'r, forms::Nil> {
        self.handle(CellRef::NIL)
    }

    /// Returns the interned symbol `name`. Symbols are never collected.
    pub fn install(&self, name: &str) -> Handle<'r, forms::Symbol> {
        let cell = self.session.heap_mut().install(name);
        self.handle(cell)
    }

    /// Returns the interned `Char` cell for `text`.
    pub fn mk_char(&self, text: &str) -> Handle<'r, forms::Char> {
        let mut heap = self.session.heap_mut();
        let cell = heap.intern_char(text);
        heap.protect(cell);
        self.handle(cell)
    }

    pub fn na_string(&self) -> Handle<'r, forms::Char> {
        let cell = self.session.heap().na_string();
        self.handle(cell)
    }

    /// Allocates a character vector. `None` elements are `NA`.
    pub fn mk_strings<'a, I>(&self, items: I) -> Handle<'r, forms::String>
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let chars: Vec<CellRef> = items
            .into_iter()
            .map(|item| match item {
                Some(text) => self.mk_char(text).cell(),
                None => self.session.heap().na_string(),
            })
            .collect();
        self.alloc(GuestObject::String(std::rc::Rc::new(
            std::cell::RefCell::new(chars),
        )))
    }

    /// Length-one character vector.
    pub fn mk_string(&self, text: &str) -> Handle<'r, forms::String> {
        self.mk_strings([Some(text)])
    }

    /// Allocates a pairlist cell.
    pub fn cons<A: FormMarker, D: FormMarker>(
        &self,
        car: Handle<'r, A>,
        cdr: Handle<'r, D>,
    ) -> Handle<'r, forms::List> {
        self.alloc(GuestObject::List {
            car: self.cell_of(car),
            cdr: self.cell_of(cdr),
            tag: CellRef::NIL,
        })
    }

    /// Allocates a tagged pairlist cell, as used for named arguments and
    /// environment frames.
    pub fn tagged_cons<A: FormMarker, D: FormMarker>(
        &self,
        tag: Handle<'r, forms::Symbol>,
        car: Handle<'r, A>,
        cdr: Handle<'r, D>,
    ) -> Handle<'r, forms::List> {
        self.alloc(GuestObject::List {
            car: self.cell_of(car),
            cdr: self.cell_of(cdr),
            tag: self.cell_of(tag),
        })
    }

    /// Builds a pairlist from `(tag, value)` items, preserving order.
    pub fn pairlist<I>(&self, items: I) -> Handle<'r>
    where
        I: IntoIterator<Item = (Option<Handle<'r, forms::Symbol>>, Handle<'r>)>,
        I::IntoIter: DoubleEndedIterator,
    {
        let mut list: Handle<'r> = self.nil().erase();
        for (tag, value) in items.into_iter().rev() {
            list = match tag {
                Some(tag) => self.tagged_cons(tag, value, list).erase(),
                None => self.cons(value, list).erase(),
            };
        }
        list
    }

    /// Allocates a call cell.
    pub fn lang<F: FormMarker, A: FormMarker>(
        &self,
        fun: Handle<'r, F>,
        args: Handle<'r, A>,
    ) -> Handle<'r, forms::Lang> {
        self.alloc(GuestObject::Lang {
            fun: self.cell_of(fun),
            args: self.cell_of(args),
        })
    }

    /// Allocates a generic vector holding `elements`.
    pub fn mk_list(&self, elements: &[Handle<'r>]) -> Handle<'r, forms::Vector> {
        let cells: Vec<CellRef> = elements.iter().map(|h| self.cell_of(*h)).collect();
        self.alloc(GuestObject::Vector {
            truelength: truelength(cells.len()),
            elements: std::rc::Rc::new(std::cell::RefCell::new(cells)),
        })
    }

    /// Allocates an expression vector holding `elements`.
    pub fn mk_expr(&self, elements: &[Handle<'r>]) -> Handle<'r, forms::Expr> {
        let cells: Vec<CellRef> = elements.iter().map(|h| self.cell_of(*h)).collect();
        self.alloc(GuestObject::Expr {
            truelength: truelength(cells.len()),
            elements: std::rc::Rc::new(std::cell::RefCell::new(cells)),
        })
    }

    /// Replaces element `index` of a character, generic or expression vector.
    ///
    /// Character vectors only accept `Char` cells.
    pub fn set_element<V: FormMarker, E: FormMarker>(
        &self,
        vector: Handle<'r, V>,
        index: usize,
        value: Handle<'r, E>,
    ) -> Result<(), BridgeError> {
        let value_form = self.form_of(value);
        let mut heap = self.session.heap_mut();
        let actual = heap.form(self.cell_of(vector));
        let elements = match heap.get_mut(self.cell_of(vector)) {
            GuestObject::String(elements) => {
                if value_form != Form::Char {
                    return Err(BridgeError::type_mismatch(Form::Char, value_form));
                }
                elements
            }
            GuestObject::Vector { elements, .. } | GuestObject::Expr { elements, .. } => elements,
            _ => return Err(BridgeError::type_mismatch(Form::Vector, actual)),
        };
        let mut elements = elements.borrow_mut();
        let len = elements.len();
        match elements.get_mut(index) {
            Some(slot) => {
                *slot = self.cell_of(value);
                Ok(())
            }
            None => Err(BridgeError::LengthMismatch {
                expected: index + 1,
                actual: len,
            }),
        }
    }

    // -- Inspection --

    pub fn form_of<F: FormMarker>(&self, handle: Handle<'r, F>) -> Form {
        self.session.heap().form(self.cell_of(handle))
    }

    /// Guest `length`: element count of vectors, cell count of pairlists and
    /// calls, 1 for everything else except `NULL`.
    pub fn length<F: FormMarker>(&self, handle: Handle<'r, F>) -> usize {
        let heap = self.session.heap();
        let object = heap.get(self.cell_of(handle));
        if let Some(len) = object.vector_len() {
            return len;
        }
        match object {
            GuestObject::Nil => 0,
            GuestObject::List { .. } | GuestObject::Lang { .. } => {
                let mut len = 0;
                let mut cursor = self.cell_of(handle);
                loop {
                    match heap.get(cursor) {
                        GuestObject::List { cdr, .. } => {
                            len += 1;
                            cursor = *cdr;
                        }
                        GuestObject::Lang { args, .. } => {
                            len += 1;
                            cursor = *args;
                        }
                        _ => break,
                    }
                }
                len
            }
            _ => 1,
        }
    }

    /// Name of a symbol.
    ///
    /// # Panics
    ///
    /// If the cell is not a symbol, which can only happen after a wrong
    /// [`Handle::unchecked_cast`].
    pub fn symbol_name(&self, symbol: Handle<'r, forms::Symbol>) -> String {
        match self.session.heap().symbol_name(self.cell_of(symbol)) {
            Some(name) => name.to_string(),
            None => panic!("symbol_name on a {} cell", self.form_of(symbol)),
        }
    }

    /// Checked form cast.
    pub fn cast<G: FormMarker, F: FormMarker>(
        &self,
        handle: Handle<'r, F>,
    ) -> Result<Handle<'r, G>, BridgeError> {
        let actual = self.form_of(handle);
        if G::admits(actual) {
            Ok(self.handle(self.cell_of(handle)))
        } else {
            Err(BridgeError::type_mismatch(
                G::FORM.unwrap_or(Form::Any),
                actual,
            ))
        }
    }

    // -- Attributes --

    pub fn attributes<F: FormMarker>(&self, handle: Handle<'r, F>) -> Handle<'r> {
        let cell = self.session.heap().attrib(self.cell_of(handle));
        self.protect(cell)
    }

    /// Sets attribute `name`, replacing an existing attribute of that name.
    ///
    /// `NULL` is a single shared cell and cannot carry attributes.
    pub fn set_attribute<F: FormMarker, V: FormMarker>(
        &self,
        handle: Handle<'r, F>,
        name: &str,
        value: Handle<'r, V>,
    ) -> Result<(), BridgeError> {
        if self.form_of(handle) == Form::Nil {
            return Err(BridgeError::type_mismatch(Form::Any, Form::Nil));
        }
        let tag = self.install(name);
        let existing = self.session.heap().attrib(self.cell_of(handle));
        let mut cursor = existing;
        loop {
            let mut heap = self.session.heap_mut();
            match heap.get_mut(cursor) {
                GuestObject::List { car, cdr, tag: t } => {
                    if *t == self.cell_of(tag) {
                        *car = self.cell_of(value);
                        return Ok(());
                    }
                    cursor = *cdr;
                }
                _ => break,
            }
        }
        let head = self.alloc::<forms::List>(GuestObject::List {
            car: self.cell_of(value),
            cdr: existing,
            tag: self.cell_of(tag),
        });
        self.session.heap_mut().set_attrib(self.cell_of(handle), head.cell());
        Ok(())
    }

    pub fn attribute<F: FormMarker>(&self, handle: Handle<'r, F>, name: &str) -> Option<Handle<'r>> {
        let tag = self.install(name).cell();
        let found = {
            let heap = self.session.heap();
            let mut cursor = heap.attrib(self.cell_of(handle));
            let mut found = None;
            while let GuestObject::List { car, cdr, tag: t } = heap.get(cursor) {
                if *t == tag {
                    found = Some(*car);
                    break;
                }
                cursor = *cdr;
            }
            found
        };
        found.map(|cell| self.protect(cell))
    }

    // -- Global environment --

    pub fn global_env(&self) -> Handle<'r, forms::Env> {
        self.handle(self.session.global_env_cell())
    }

    /// Binds `name` to `value` in the global environment.
    pub fn assign<F: FormMarker>(&self, name: &str, value: Handle<'r, F>) {
        let symbol = self.install(name);
        self.define(self.global_env(), symbol, value.erase());
    }

    /// Binds `symbol` to `value` in `env`'s frame.
    pub fn define(
        &self,
        env: Handle<'r, forms::Env>,
        symbol: Handle<'r, forms::Symbol>,
        value: Handle<'r>,
    ) {
        let frame = match self.session.heap().get(self.cell_of(env)) {
            GuestObject::Env { frame, .. } => *frame,
            other => panic!("define: expected environment, got {}", other.form()),
        };

        let mut cursor = frame;
        loop {
            let mut heap = self.session.heap_mut();
            match heap.get_mut(cursor) {
                GuestObject::List { car, cdr, tag } => {
                    if *tag == self.cell_of(symbol) {
                        *car = self.cell_of(value);
                        return;
                    }
                    cursor = *cdr;
                }
                _ => break,
            }
        }

        let binding = self.alloc::<forms::List>(GuestObject::List {
            car: self.cell_of(value),
            cdr: frame,
            tag: self.cell_of(symbol),
        });
        let mut heap = self.session.heap_mut();
        if let GuestObject::Env { frame, .. } = heap.get_mut(self.cell_of(env)) {
            *frame = binding.cell();
        }
    }

    /// Looks `name` up in the global environment.
    pub fn lookup(&self, name: &str) -> Option<Handle<'r>> {
        let symbol = self.install(name);
        self.find_binding(self.global_env(), symbol)
    }

    /// Looks `symbol` up in `env` and its enclosing environments.
    pub fn find_binding(
        &self,
        env: Handle<'r, forms::Env>,
        symbol: Handle<'r, forms::Symbol>,
    ) -> Option<Handle<'r>> {
        let found = {
            let heap = self.session.heap();
            let mut env = self.cell_of(env);
            let mut found = None;
            'envs: while let GuestObject::Env { frame, enclos, .. } = heap.get(env) {
                let mut cursor = *frame;
                while let GuestObject::List { car, cdr, tag } = heap.get(cursor) {
                    if *tag == self.cell_of(symbol) {
                        found = Some(*car);
                        break 'envs;
                    }
                    cursor = *cdr;
                }
                env = *enclos;
            }
            found
        };
        found.map(|cell| self.protect(cell))
    }

    // -- Evaluation --

    /// Parses `source` with the session's evaluator.
    pub fn parse(&self, source: &str) -> Result<Handle<'r, forms::Expr>, BridgeError> {
        self.session.evaluator().parse(self, source)
    }

    /// Parses and evaluates `source` in the global environment, returning
    /// the value of the last expression (`NULL` for empty input).
    pub fn eval(&self, source: &str) -> Result<Handle<'r>, BridgeError> {
        let exprs = self.parse(source)?;
        let cells: Vec<CellRef> = match self.session.heap().get(self.cell_of(exprs)) {
            GuestObject::Expr { elements, .. } => elements.borrow().clone(),
            other => panic!("parse returned {} instead of expression", other.form()),
        };
        let env = self.global_env();
        let mut result = self.nil().erase();
        for cell in cells {
            result = self
                .session
                .evaluator()
                .eval(self, self.handle(cell), env)?;
        }
        Ok(result)
    }

    /// Evaluates an already-built call or value in the global environment.
    pub fn eval_call<F: FormMarker>(&self, expr: Handle<'r, F>) -> Result<Handle<'r>, BridgeError> {
        self.session
            .evaluator()
            .eval(self, expr.erase(), self.global_env())
    }

    // -- Raw handles --

    /// Rebinds an erased handle into this region.
    ///
    /// Fails with [`BridgeError::UseAfterRegionRelease`] when the handle
    /// came from a region that has closed, from another session, or from an
    /// automatic link that has been finalized. The check is exact: epochs are
    /// never reused and reclaimed cells change generation.
    pub fn rebind(&self, raw: RawHandle) -> Result<Handle<'r>, BridgeError> {
        if raw.session != self.session.id() {
            return Err(BridgeError::UseAfterRegionRelease);
        }
        let valid = {
            let heap = self.session.heap();
            let owner_alive = if raw.epoch == AUTOMATIC_EPOCH {
                heap.precious_count(raw.cell) > 0
            } else {
                raw.epoch == self.epoch
            };
            owner_alive && heap.is_live(raw.cell)
        };
        if !valid {
            return Err(BridgeError::UseAfterRegionRelease);
        }
        Ok(self.protect(raw.cell))
    }

    /// Rebinds an erased handle without any check.
    ///
    /// # Safety
    ///
    /// The cell behind `raw` must still be protected by this region, by an
    /// automatic link, or by a guest-side root. Otherwise later accesses read
    /// a reclaimed slot and panic, or see an unrelated cell that reused it.
    /// `raw` must also come from this session; debug builds panic on the
    /// first access if it does not.
    pub unsafe fn rebind_unchecked(&self, raw: RawHandle) -> Handle<'r> {
        Handle::new(raw.cell, self.epoch, raw.session)
    }
}
