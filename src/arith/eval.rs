//! Evaluation of lowered guest expressions.
//!
//! Symbols resolve through the environment chain. Calls evaluate their
//! arguments left to right and dispatch on the function symbol to a small
//! set of builtins; there are no closures.

use crate::{
    arith::{
        ast::Op,
        deparse::{call_args, deparse, format_int, format_real},
    },
    error::BridgeError,
    runtime::{
        evaluator::GuestError,
        form::{Form, forms},
        handle::Handle,
        region::Region,
        value::{Element, Logical, NA_INTEGER, na_real},
        view::TaggedView,
    },
};

/// Why a builtin stopped.
enum Signal {
    /// Reported against the call being evaluated.
    Error(String),
    /// Raised by `stop()` at top level; reported without a call.
    Stop(String),
    Bridge(BridgeError),
}

impl From<BridgeError> for Signal {
    fn from(err: BridgeError) -> Self {
        Signal::Bridge(err)
    }
}

type Outcome<'r> = Result<Handle<'r>, Signal>;

struct Argument<'r> {
    name: Option<String>,
    value: Handle<'r>,
}

pub fn eval<'r>(
    region: &Region<'r>,
    expr: Handle<'r>,
    env: Handle<'r, forms::Env>,
) -> Result<Handle<'r>, BridgeError> {
    match region.form_of(expr) {
        Form::Symbol => {
            let symbol = region.cast::<forms::Symbol, _>(expr)?;
            region.find_binding(env, symbol).ok_or_else(|| {
                GuestError::new(format!("object '{}' not found", region.symbol_name(symbol)))
                    .into()
            })
        }
        Form::Lang => apply(region, expr, env),
        _ => Ok(expr),
    }
}

fn apply<'r>(
    region: &Region<'r>,
    call: Handle<'r>,
    env: Handle<'r, forms::Env>,
) -> Result<Handle<'r>, BridgeError> {
    let TaggedView::Lang { fun, args } = region.view(call) else {
        return Ok(call);
    };
    let Some(name) = region
        .cast::<forms::Symbol, _>(fun)
        .ok()
        .map(|symbol| region.symbol_name(symbol))
    else {
        return Err(GuestError::in_call(deparse(region, call), "attempt to apply non-function").into());
    };

    let mut values = Vec::new();
    for (arg_name, arg) in call_args(region, args) {
        values.push(Argument {
            name: arg_name,
            value: eval(region, arg, env)?,
        });
    }

    let outcome = match (Op::from_symbol(&name), name.as_str()) {
        (Some(op), _) => arithmetic(region, op, &values),
        (None, "c") => combine(region, &values),
        (None, "sum") => sum(region, &values),
        (None, "length") => length(region, &values),
        (None, "identity") => identity(&values),
        (None, "stop") => stop(region, &values),
        (None, "plot") => plot(region, &values),
        (None, other) => Err(Signal::Error(format!("could not find function \"{}\"", other))),
    };

    outcome.map_err(|signal| match signal {
        Signal::Error(message) => GuestError::in_call(deparse(region, call), message).into(),
        Signal::Stop(message) => GuestError::new(message).into(),
        Signal::Bridge(err) => err,
    })
}

/// Argument matched by exact name, else the `position`-th unnamed one.
fn matched<'a, 'r>(args: &'a [Argument<'r>], name: &str, position: usize) -> Option<&'a Argument<'r>> {
    args.iter()
        .find(|arg| arg.name.as_deref() == Some(name))
        .or_else(|| args.iter().filter(|arg| arg.name.is_none()).nth(position))
}

fn missing(name: &str) -> Signal {
    Signal::Error(format!("argument \"{}\" is missing, with no default", name))
}

// -- Arithmetic --

enum Numeric {
    Int(Vec<i32>),
    Real(Vec<f64>),
}

impl Numeric {
    fn into_real(self) -> Vec<f64> {
        match self {
            Numeric::Real(v) => v,
            Numeric::Int(v) => v
                .into_iter()
                .map(|i| if i == NA_INTEGER { na_real() } else { f64::from(i) })
                .collect(),
        }
    }
}

fn numeric<'r>(region: &Region<'r>, handle: Handle<'r>) -> Result<Option<Numeric>, BridgeError> {
    Ok(match region.view(handle) {
        TaggedView::Int(v) => Some(Numeric::Int(v.to_vec())),
        TaggedView::Real(v) => Some(Numeric::Real(v.to_vec())),
        TaggedView::Logical(v) => Some(Numeric::Int(v.to_vec().into_iter().map(logical_to_int).collect())),
        _ => None,
    })
}

fn logical_to_int(value: Logical) -> i32 {
    match value {
        Logical::False => 0,
        Logical::True => 1,
        Logical::Na => NA_INTEGER,
    }
}

fn recycle<A: Copy, B: Copy, T>(a: &[A], b: &[B], f: impl Fn(A, B) -> T) -> Vec<T> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let n = a.len().max(b.len());
    (0..n).map(|i| f(a[i % a.len()], b[i % b.len()])).collect()
}

fn int_op(op: Op, x: i32, y: i32) -> i32 {
    if x == NA_INTEGER || y == NA_INTEGER {
        return NA_INTEGER;
    }
    let result = match op {
        Op::Add => x.checked_add(y),
        Op::Sub => x.checked_sub(y),
        Op::Mul => x.checked_mul(y),
        Op::Div | Op::Pow => None,
    };
    result.unwrap_or(NA_INTEGER)
}

fn real_op(op: Op, x: f64, y: f64) -> f64 {
    if x.is_na() || y.is_na() {
        return na_real();
    }
    match op {
        Op::Add => x + y,
        Op::Sub => x - y,
        Op::Mul => x * y,
        Op::Div => x / y,
        Op::Pow => x.powf(y),
    }
}

fn arithmetic<'r>(region: &Region<'r>, op: Op, args: &[Argument<'r>]) -> Outcome<'r> {
    match args {
        [operand] => {
            let Some(value) = numeric(region, operand.value)? else {
                return Err(Signal::Error("invalid argument to unary operator".to_string()));
            };
            Ok(match (op, value) {
                (Op::Add, Numeric::Int(v)) => region.encode(v).erase(),
                (Op::Add, Numeric::Real(v)) => region.encode(v).erase(),
                (Op::Sub, Numeric::Int(v)) => region
                    .encode(v.into_iter().map(|i| int_op(Op::Sub, 0, i)).collect::<Vec<_>>())
                    .erase(),
                (Op::Sub, Numeric::Real(v)) => region
                    .encode(v.into_iter().map(|x| -x).collect::<Vec<_>>())
                    .erase(),
                _ => return Err(Signal::Error("invalid unary operator".to_string())),
            })
        }
        [left, right] => {
            let (Some(a), Some(b)) = (numeric(region, left.value)?, numeric(region, right.value)?)
            else {
                return Err(Signal::Error("non-numeric argument to binary operator".to_string()));
            };
            Ok(match (op, a, b) {
                (Op::Add | Op::Sub | Op::Mul, Numeric::Int(a), Numeric::Int(b)) => {
                    region.encode(recycle(&a, &b, |x, y| int_op(op, x, y))).erase()
                }
                (_, a, b) => {
                    let (a, b) = (a.into_real(), b.into_real());
                    region.encode(recycle(&a, &b, |x, y| real_op(op, x, y))).erase()
                }
            })
        }
        _ => Err(Signal::Error("operator needs one or two arguments".to_string())),
    }
}

// -- Builtins --

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Rank {
    Logical,
    Int,
    Real,
    String,
}

fn rank(form: Form) -> Option<Rank> {
    match form {
        Form::Logical => Some(Rank::Logical),
        Form::Int => Some(Rank::Int),
        Form::Real => Some(Rank::Real),
        Form::String => Some(Rank::String),
        _ => None,
    }
}

fn as_strings<'r>(region: &Region<'r>, handle: Handle<'r>) -> Result<Vec<Option<String>>, BridgeError> {
    Ok(match region.view(handle) {
        TaggedView::Logical(v) => v
            .to_vec()
            .into_iter()
            .map(|l| l.to_bool().map(|_| l.to_string()))
            .collect(),
        TaggedView::Int(v) => v
            .to_vec()
            .into_iter()
            .map(|i| (!i.is_na()).then(|| format_int(i)))
            .collect(),
        TaggedView::Real(v) => v
            .to_vec()
            .into_iter()
            .map(|x| (!x.is_na()).then(|| format_real(x)))
            .collect(),
        _ => region.decode::<Vec<Option<String>>, _>(handle)?,
    })
}

fn combine<'r>(region: &Region<'r>, args: &[Argument<'r>]) -> Outcome<'r> {
    let items: Vec<Handle<'r>> = args
        .iter()
        .map(|arg| arg.value)
        .filter(|value| !value.is_nil())
        .collect();
    if items.is_empty() {
        return Ok(region.nil().erase());
    }

    let ranks: Option<Vec<Rank>> = items.iter().map(|h| rank(region.form_of(*h))).collect();
    let Some(top) = ranks.and_then(|ranks| ranks.into_iter().max()) else {
        return Ok(region.mk_list(&items).erase());
    };

    Ok(match top {
        Rank::String => {
            let mut out = Vec::new();
            for item in &items {
                out.extend(as_strings(region, *item)?);
            }
            region.encode(out).erase()
        }
        Rank::Logical => {
            let mut out = Vec::new();
            for item in &items {
                out.extend(region.alias::<Logical, _>(*item)?.to_vec());
            }
            region.encode(out).erase()
        }
        Rank::Int => {
            let mut out = Vec::new();
            for item in &items {
                if let Some(Numeric::Int(v)) = numeric(region, *item)? {
                    out.extend(v);
                }
            }
            region.encode(out).erase()
        }
        Rank::Real => {
            let mut out = Vec::new();
            for item in &items {
                if let Some(values) = numeric(region, *item)? {
                    out.extend(values.into_real());
                }
            }
            region.encode(out).erase()
        }
    })
}

fn sum<'r>(region: &Region<'r>, args: &[Argument<'r>]) -> Outcome<'r> {
    let na_rm = match args.iter().find(|arg| arg.name.as_deref() == Some("na.rm")) {
        Some(arg) => region.decode::<bool, _>(arg.value).unwrap_or(false),
        None => false,
    };

    let mut ints: Vec<i32> = Vec::new();
    let mut reals: Vec<f64> = Vec::new();
    let mut any_real = false;
    for arg in args.iter().filter(|arg| arg.name.as_deref() != Some("na.rm")) {
        if arg.value.is_nil() {
            continue;
        }
        match numeric(region, arg.value)? {
            Some(Numeric::Int(v)) => ints.extend(v),
            Some(Numeric::Real(v)) => {
                any_real = true;
                reals.extend(v);
            }
            None => {
                return Err(Signal::Error(format!(
                    "invalid 'type' ({}) of argument",
                    region.form_of(arg.value)
                )));
            }
        }
    }

    if any_real {
        let mut total = 0.0;
        let values = Numeric::Int(ints).into_real().into_iter().chain(reals);
        for x in values {
            if x.is_na() {
                if na_rm {
                    continue;
                }
                return Ok(region.encode(na_real()).erase());
            }
            total += x;
        }
        return Ok(region.encode(total).erase());
    }

    let mut total: i64 = 0;
    for i in ints {
        if i == NA_INTEGER {
            if na_rm {
                continue;
            }
            return Ok(region.encode(NA_INTEGER).erase());
        }
        total += i64::from(i);
    }
    let total = i32::try_from(total)
        .ok()
        .filter(|t| *t != NA_INTEGER)
        .unwrap_or(NA_INTEGER);
    Ok(region.encode(total).erase())
}

fn length<'r>(region: &Region<'r>, args: &[Argument<'r>]) -> Outcome<'r> {
    match args {
        [arg] => {
            let len = region.length(arg.value);
            Ok(match i32::try_from(len) {
                Ok(len) => region.encode(len).erase(),
                Err(_) => region.encode(len as f64).erase(),
            })
        }
        _ => Err(Signal::Error(format!(
            "{} arguments passed to 'length' which requires 1",
            args.len()
        ))),
    }
}

fn identity<'r>(args: &[Argument<'r>]) -> Outcome<'r> {
    matched(args, "x", 0).map(|arg| arg.value).ok_or_else(|| missing("x"))
}

fn stop<'r>(region: &Region<'r>, args: &[Argument<'r>]) -> Outcome<'r> {
    let mut message = String::new();
    for arg in args {
        for part in as_strings(region, arg.value)? {
            message.push_str(part.as_deref().unwrap_or("NA"));
        }
    }
    Err(Signal::Stop(message))
}

/// No graphics device is attached: a well-formed call draws nothing and
/// returns `NULL`.
fn plot<'r>(region: &Region<'r>, args: &[Argument<'r>]) -> Outcome<'r> {
    matched(args, "x", 0).ok_or_else(|| missing("x"))?;
    Ok(region.nil().erase())
}
