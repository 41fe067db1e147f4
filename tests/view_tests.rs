use crossheap::{Config, Form, Handle, Region, Session, TaggedView};

fn torture_session() -> Session {
    Session::new(Config::default().with_gc_torture(true))
}

/// Rebuilds a cell from its view and checks that viewing it again gives the
/// same decomposition.
fn assert_round_trip<'r>(region: &Region<'r>, view: TaggedView<'r>) -> Handle<'r> {
    let rebuilt = region.unview(&view).unwrap();
    assert_eq!(region.form_of(rebuilt), view.form());
    assert_eq!(region.view(rebuilt), view);
    rebuilt
}

#[test]
fn reference_forms_round_trip() {
    let session = torture_session();
    session.with_region(|region| {
        let nil = region.nil().erase();
        let one = region.encode(1.0).erase();
        let name = region.mk_char("x").erase();
        let env = region.global_env().erase();
        let formals = region.pairlist([(Some(region.install("x")), nil)]);

        let views = vec![
            TaggedView::Closure {
                formals,
                body: one,
                env,
            },
            TaggedView::Env {
                frame: formals,
                enclos: env,
                hashtab: nil,
            },
            TaggedView::Promise {
                value: one,
                expr: region.install("x").erase(),
                env,
            },
            TaggedView::ExtPtr {
                addr: 0xdead_beef,
                prot: one,
                tag: name,
            },
            TaggedView::WeakRef {
                key: env,
                value: one,
                finalizer: nil,
                next: nil,
            },
            TaggedView::S4 { tagval: formals },
            TaggedView::Bytecode {
                code: region.encode(vec![12, 1, 1]).erase(),
                consts: region.mk_list(&[one, name]).erase(),
            },
            TaggedView::DotDotDot { args: formals },
            TaggedView::Special { offset: 3 },
            TaggedView::Builtin { offset: 17 },
            TaggedView::Lang {
                fun: region.install("f").erase(),
                args: formals,
            },
            TaggedView::List {
                car: one,
                cdr: nil,
                tag: region.install("a").erase(),
            },
        ];
        for view in views {
            let rebuilt = assert_round_trip(region, view.clone());
            assert!(region.heq(rebuilt, region.unview(&view).unwrap()));
        }
    });
}

#[test]
fn views_of_existing_cells_round_trip() {
    let session = Session::new(Config::default());
    session.with_region(|region| {
        let kept = region.encode(vec![4.0, 5.0]);
        region.assign("kept", kept);

        let global = region.view(region.global_env());
        let TaggedView::Env { frame, .. } = global.clone() else {
            panic!("global environment is not viewed as an environment");
        };
        assert_eq!(region.form_of(frame), Form::List);
        let copy = assert_round_trip(region, global);
        assert!(copy != region.global_env());

        let existing = [
            region.install("kept").erase(),
            region.mk_char("kept").erase(),
            region.encode(vec!["a".to_string(), "b".to_string()]).erase(),
            region.mk_list(&[kept.erase(), region.nil().erase()]).erase(),
            region.mk_expr(&[region.install("kept").erase()]).erase(),
            region.encode(vec![true, false]).erase(),
            kept.erase(),
        ];
        for handle in existing {
            assert_round_trip(region, region.view(handle));
        }
    });
}

#[test]
fn interned_forms_come_back_as_the_same_cell() {
    let session = Session::new(Config::default());
    session.with_region(|region| {
        let symbol = region.install("pi");
        assert!(region.unview(&region.view(symbol)).unwrap() == symbol);

        let text = region.mk_char("pi");
        assert!(region.unview(&region.view(text)).unwrap() == text);

        assert!(region.unview(&TaggedView::Nil).unwrap().is_nil());
    });
}

#[test]
fn unknown_form_codes_round_trip() {
    let session = Session::new(Config::default());
    session.with_region(|region| {
        let other = assert_round_trip(region, TaggedView::Unrecognized { code: 99 });
        assert_eq!(region.form_of(other), Form::Other(99));
        assert!(region.unview(&TaggedView::Unrecognized { code: 14 }).is_err());
    });
}
