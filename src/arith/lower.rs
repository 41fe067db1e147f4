//! Lowering of host syntax trees into guest call cells.

use crate::{
    arith::ast::{Expr, Op},
    runtime::{form::forms, handle::Handle, region::Region, value::Logical},
};

pub fn lower<'r>(region: &Region<'r>, expr: &Expr) -> Handle<'r> {
    match expr {
        Expr::Num(value) => region.encode(*value).erase(),
        Expr::Int(value) => region.encode(*value).erase(),
        Expr::Str(text) => region.encode(text.as_str()).erase(),
        Expr::Bool(value) => region.encode(*value).erase(),
        Expr::Na => region.encode(Logical::Na).erase(),
        Expr::Null => region.nil().erase(),
        Expr::Ident(name) => region.install(name).erase(),
        Expr::Unary { op, operand } => {
            let operand = lower(region, operand);
            call(region, *op, region.pairlist([(None, operand)]))
        }
        Expr::Binary { op, left, right } => {
            let left = lower(region, left);
            let right = lower(region, right);
            call(region, *op, region.pairlist([(None, left), (None, right)]))
        }
        Expr::Call { callee, args } => {
            let fun = lower(region, callee);
            let args: Vec<(Option<Handle<'r, forms::Symbol>>, Handle<'r>)> = args
                .iter()
                .map(|arg| {
                    let tag = arg.name.as_deref().map(|name| region.install(name));
                    (tag, lower(region, &arg.value))
                })
                .collect();
            let args = region.pairlist(args);
            region.lang(fun, args).erase()
        }
    }
}

fn call<'r>(region: &Region<'r>, op: Op, args: Handle<'r>) -> Handle<'r> {
    region.lang(region.install(op.symbol()), args).erase()
}
