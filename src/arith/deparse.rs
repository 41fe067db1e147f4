//! Renders guest expressions back to source text, for error messages.

use crate::{
    arith::{
        ast::Op,
        precedence::{Precedence, op_precedence},
    },
    runtime::{
        form::forms,
        handle::Handle,
        region::Region,
        value::{Element, Logical, NA_INTEGER},
        view::{GuestVector, TaggedView},
    },
};

pub fn deparse<'r>(region: &Region<'r>, expr: Handle<'r>) -> String {
    let mut out = String::new();
    write_expr(region, expr, Precedence::Lowest, &mut out);
    out
}

pub fn format_real(value: f64) -> String {
    if value.is_na() {
        "NA".to_string()
    } else if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "Inf" } else { "-Inf" }.to_string()
    } else {
        value.to_string()
    }
}

pub fn format_int(value: i32) -> String {
    if value == NA_INTEGER {
        "NA".to_string()
    } else {
        value.to_string()
    }
}

fn write_vector<T: Element>(
    v: &GuestVector<'_, T>,
    empty: &str,
    fmt: impl Fn(T) -> String,
    out: &mut String,
) {
    let items: Vec<String> = v.to_vec().into_iter().map(fmt).collect();
    match items.as_slice() {
        [] => out.push_str(empty),
        [single] => out.push_str(single),
        _ => {
            out.push_str("c(");
            out.push_str(&items.join(", "));
            out.push(')');
        }
    }
}

fn symbol_text<'r>(region: &Region<'r>, handle: Handle<'r>) -> Option<String> {
    region
        .cast::<forms::Symbol, _>(handle)
        .ok()
        .map(|symbol| region.symbol_name(symbol))
}

/// Positional and named arguments of a call, in order.
pub fn call_args<'r>(region: &Region<'r>, mut args: Handle<'r>) -> Vec<(Option<String>, Handle<'r>)> {
    let mut out = Vec::new();
    while let TaggedView::List { car, cdr, tag } = region.view(args) {
        let name = if tag.is_nil() {
            None
        } else {
            symbol_text(region, tag)
        };
        out.push((name, car));
        args = cdr;
    }
    out
}

fn write_expr<'r>(region: &Region<'r>, expr: Handle<'r>, context: Precedence, out: &mut String) {
    match region.view(expr) {
        TaggedView::Nil => out.push_str("NULL"),
        TaggedView::Symbol { .. } => out.push_str(&symbol_text(region, expr).unwrap_or_default()),
        TaggedView::Real(v) => write_vector(&v, "numeric(0)", format_real, out),
        TaggedView::Int(v) => write_vector(&v, "integer(0)", |i| format!("{}L", format_int(i)), out),
        TaggedView::Logical(v) => write_vector(&v, "logical(0)", |l: Logical| l.to_string(), out),
        TaggedView::Complex(v) => write_vector(&v, "complex(0)", |c| c.to_string(), out),
        TaggedView::String(v) => {
            let items: Vec<String> = v
                .to_vec()
                .into_iter()
                .map(|c| match region.decode::<Option<String>, _>(c) {
                    Ok(Some(text)) => format!("{:?}", text),
                    _ => "NA".to_string(),
                })
                .collect();
            match items.as_slice() {
                [] => out.push_str("character(0)"),
                [single] => out.push_str(single),
                _ => {
                    out.push_str("c(");
                    out.push_str(&items.join(", "));
                    out.push(')');
                }
            }
        }
        TaggedView::Lang { fun, args } => write_call(region, fun, args, context, out),
        other => {
            out.push('<');
            out.push_str(other.form().label());
            out.push('>');
        }
    }
}

fn write_call<'r>(
    region: &Region<'r>,
    fun: Handle<'r>,
    args: Handle<'r>,
    context: Precedence,
    out: &mut String,
) {
    let args = call_args(region, args);
    let name = symbol_text(region, fun);
    let op = name.as_deref().and_then(Op::from_symbol);

    match (op, args.as_slice()) {
        (Some(op), [(None, left), (None, right)]) => {
            let precedence = op_precedence(op);
            let (left_ctx, right_ctx) = match op {
                Op::Pow => (Precedence::Call, Precedence::Power),
                Op::Add | Op::Sub => (Precedence::Sum, Precedence::Product),
                Op::Mul | Op::Div => (Precedence::Product, Precedence::Prefix),
            };
            let parens = precedence < context;
            if parens {
                out.push('(');
            }
            write_expr(region, *left, left_ctx, out);
            if op == Op::Pow {
                out.push('^');
            } else {
                out.push(' ');
                out.push_str(op.symbol());
                out.push(' ');
            }
            write_expr(region, *right, right_ctx, out);
            if parens {
                out.push(')');
            }
        }
        (Some(op @ (Op::Add | Op::Sub)), [(None, operand)]) => {
            let parens = Precedence::Prefix < context;
            if parens {
                out.push('(');
            }
            out.push_str(op.symbol());
            write_expr(region, *operand, Precedence::Prefix, out);
            if parens {
                out.push(')');
            }
        }
        _ => {
            write_expr(region, fun, Precedence::Call, out);
            out.push('(');
            for (i, (name, value)) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                if let Some(name) = name {
                    out.push_str(name);
                    out.push_str(" = ");
                }
                write_expr(region, *value, Precedence::Lowest, out);
            }
            out.push(')');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, runtime::session::Session};

    fn round(source: &str) -> String {
        let session = Session::new(Config::default());
        session.with_region(|region| {
            let exprs = region.parse(source).unwrap();
            let TaggedView::Expr(items) = region.view(exprs) else {
                panic!("expected expression vector");
            };
            deparse(region, items.get(0).unwrap())
        })
    }

    #[test]
    fn binary_operators_keep_needed_parens() {
        assert_eq!(round("(1 + 2) * x"), "(1 + 2) * x");
        assert_eq!(round("1 - (2 - 3)"), "1 - (2 - 3)");
        assert_eq!(round("1 - 2 - 3"), "1 - 2 - 3");
        assert_eq!(round("2^3^2"), "2^3^2");
        assert_eq!(round("-x ^ 2"), "-x^2");
    }

    #[test]
    fn calls_and_literals() {
        assert_eq!(round("f(1L, n = 'a', TRUE)"), "f(1L, n = \"a\", TRUE)");
        assert_eq!(round("plot()"), "plot()");
        assert_eq!(round("NULL"), "NULL");
        assert_eq!(round("2.5"), "2.5");
    }
}
