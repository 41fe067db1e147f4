use std::panic::{AssertUnwindSafe, catch_unwind};

use crossheap::{BridgeError, Config, Form, Session, forms};

fn torture_session() -> Session {
    Session::new(Config::default().with_gc_torture(true))
}

#[test]
fn protected_values_survive_collection() {
    let session = Session::new(Config::default());
    session.with_region(|region| {
        let values = region.encode(vec![1.5, 2.5]);
        session.collect();
        assert_eq!(region.decode::<Vec<f64>, _>(values).unwrap(), vec![1.5, 2.5]);
    });
}

#[test]
fn region_exit_releases_everything_at_once() {
    let session = Session::new(Config::default());
    let before = session.stats().protected;
    let raws = session.with_region(|region| {
        (0..50)
            .map(|i| region.encode(i).raw())
            .collect::<Vec<_>>()
    });
    assert_eq!(session.stats().protected, before);
    session.collect();
    assert!(raws.iter().all(|raw| !session.is_live(*raw)));
}

#[test]
fn rebind_within_region_succeeds() {
    let session = Session::new(Config::default());
    session.with_region(|region| {
        let raw = region.encode("kept").raw();
        let again = region.rebind(raw).unwrap();
        assert_eq!(region.decode::<String, _>(again).unwrap(), "kept");
    });
}

#[test]
fn rebind_after_release_fails_even_if_slot_is_reused() {
    let session = Session::new(Config::default());
    let raw = session.with_region(|region| region.encode(7).raw());
    session.collect();
    session.with_region(|region| {
        // Refill the heap so the released slot is likely reused.
        for i in 0..64 {
            region.encode(i);
        }
        assert_eq!(
            region.rebind(raw).unwrap_err(),
            BridgeError::UseAfterRegionRelease
        );
    });
}

#[test]
fn rebind_from_another_session_fails() {
    let first = Session::new(Config::default());
    let second = Session::new(Config::default());
    first.with_region(|a| {
        let raw = a.encode(1.0).raw();
        second.with_region(|b| {
            assert_eq!(b.rebind(raw).unwrap_err(), BridgeError::UseAfterRegionRelease);
        });
    });
}

#[test]
fn nested_regions_release_only_at_outermost_exit() {
    let session = torture_session();
    session.with_region(|outer| {
        let raw = outer.nested(|inner| inner.encode(vec![3, 4]).raw());
        let _pressure = outer.encode(vec![0; 16]);
        let values = outer.rebind(raw).unwrap();
        assert_eq!(outer.decode::<Vec<i32>, _>(values).unwrap(), vec![3, 4]);
    });
    assert!(!session.in_region());
    assert_eq!(session.stats().protected, 0);
}

#[test]
fn torture_mode_keeps_region_values_intact() {
    let session = torture_session();
    session.with_region(|region| {
        let names: Vec<String> = (0..20).map(|i| format!("name-{}", i)).collect();
        let handle = region.encode(names.clone());
        let list = region.pairlist(
            (0..5)
                .map(|i| (None, region.encode(i as f64).erase()))
                .collect::<Vec<_>>(),
        );
        region.encode(vec![true; 8]);
        assert_eq!(region.decode::<Vec<String>, _>(handle).unwrap(), names);
        assert_eq!(region.length(list), 5);
    });
    assert!(session.stats().total_collections > 20);
}

#[test]
fn panic_inside_region_releases_protection() {
    let session = Session::new(Config::default());
    let result = catch_unwind(AssertUnwindSafe(|| {
        session.with_region(|region| {
            region.encode(vec![1.0; 4]);
            panic!("host failure");
        })
    }));
    assert!(result.is_err());
    assert_eq!(session.stats().protected, 0);
    assert!(!session.in_region());
    // The session is still usable.
    let n = session.with_region(|region| region.length(region.encode(vec![1, 2, 3])));
    assert_eq!(n, 3);
}

#[test]
fn cast_is_checked_and_unchecked_cast_is_not() {
    let session = Session::new(Config::default());
    session.with_region(|region| {
        let erased = region.encode(2.0).erase();
        let real = region.cast::<forms::Real, _>(erased).unwrap();
        assert!(real == erased);

        let err = region.cast::<forms::Int, _>(erased).unwrap_err();
        assert_eq!(
            err,
            BridgeError::TypeMismatch {
                expected: Form::Int,
                actual: Form::Real
            }
        );

        // SAFETY: the cell was just created as a double vector.
        let trusted = unsafe { erased.unchecked_cast::<forms::Real>() };
        assert_eq!(region.form_of(trusted), Form::Real);
        assert!(region.cast::<forms::Any, _>(erased).is_ok());
    });
}

#[test]
fn rebind_unchecked_inside_region() {
    let session = Session::new(Config::default());
    session.with_region(|region| {
        let raw = region.encode(11).raw();
        // SAFETY: the cell is protected by this region.
        let handle = unsafe { region.rebind_unchecked(raw) };
        assert_eq!(region.decode::<i32, _>(handle).unwrap(), 11);
    });
}

#[test]
fn global_bindings_are_guest_roots() {
    let session = Session::new(Config::default());
    let raw = session.with_region(|region| {
        let value = region.encode("rooted");
        region.assign("rooted", value);
        value.raw()
    });
    session.collect();
    assert!(session.is_live(raw));
}

#[test]
#[should_panic(expected = "symbol_name on a double cell")]
fn wrong_unchecked_cast_panics_in_typed_accessor() {
    let session = Session::new(Config::default());
    session.with_region(|region| {
        let number = region.encode(1.0);
        // SAFETY: deliberately wrong; the accessor must panic rather than read.
        let bogus = unsafe { number.unchecked_cast::<forms::Symbol>() };
        region.symbol_name(bogus);
    });
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "handle used outside its session")]
fn foreign_raw_handle_is_caught_in_debug_builds() {
    let first = Session::new(Config::default());
    let second = Session::new(Config::default());
    let raw = first.with_region(|a| {
        let value = a.encode(vec![1.0, 2.0]);
        a.assign("kept", value);
        value.raw()
    });
    second.with_region(|b| {
        // SAFETY: deliberately wrong; the raw handle belongs to `first`.
        let foreign = unsafe { b.rebind_unchecked(raw) };
        b.form_of(foreign);
    });
}

#[test]
fn null_refuses_attributes() {
    let session = Session::new(Config::default());
    session.with_region(|region| {
        let class = region.mk_string("point");
        assert_eq!(
            region.set_attribute(region.nil(), "class", class),
            Err(BridgeError::TypeMismatch {
                expected: Form::Any,
                actual: Form::Nil
            })
        );
        let value = region.encode(1.0);
        region.set_attribute(value, "class", class).unwrap();
        assert!(region.attribute(value, "class").is_some());
    });
    session.with_region(|region| {
        let empty = region.encode(());
        assert!(region.attribute(empty, "class").is_none());
        assert_eq!(region.length(region.attributes(empty)), 0);
        assert!(region.attributes(empty).is_nil());
    });
}

#[test]
fn list_constructors_record_their_length() {
    let session = Session::new(Config::default());
    session.with_region(|region| {
        let elements: Vec<_> = (0..300).map(|i| region.encode(i).erase()).collect();
        assert_eq!(region.length(region.mk_list(&elements)), 300);
        assert_eq!(region.length(region.mk_expr(&elements[..7])), 7);
    });
}
