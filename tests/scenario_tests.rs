use crossheap::{BridgeError, Config, TaggedView, global};
use insta::assert_snapshot;

/// Every test in this binary shares the process runtime.
fn ensure_runtime() {
    match global::initialize(Config::default()) {
        Ok(()) | Err(BridgeError::AlreadyInitialized) => {}
        Err(err) => panic!("cannot start guest runtime: {}", err),
    }
}

#[test]
fn host_value_flows_through_guest_arithmetic() {
    ensure_runtime();
    let result = global::submit(|session| {
        session.with_region(|region| {
            region.assign("x", region.encode(1.0));
            let value = region.eval("x + 1")?;
            region.decode::<f64, _>(value)
        })
    })
    .unwrap();
    assert_eq!(result, Ok(2.0));
}

#[test]
fn encoded_vector_is_viewed_by_form() {
    ensure_runtime();
    let contents = global::submit(|session| {
        session.with_region(|region| match region.view(region.encode(vec![2.0, 3.0])) {
            TaggedView::Real(values) => Some(values.to_vec()),
            _ => None,
        })
    })
    .unwrap();
    assert_eq!(contents, Some(vec![2.0, 3.0]));
}

#[test]
fn guest_error_text_reaches_the_host_unchanged() {
    ensure_runtime();
    let err = global::submit(|session| session.with_region(|region| region.eval("plot()").map(|_| ())))
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, BridgeError::GuestRuntime { .. }));
    assert_snapshot!(err.to_string(), @r#"
    Error in plot() :
      argument "x" is missing, with no default
    "#);
}

#[test]
fn guest_vectors_combine_and_reduce() {
    ensure_runtime();
    let total = global::submit(|session| {
        session.with_region(|region| {
            region.assign("v", region.encode(vec![1, 2, 3]));
            let value = region.eval("sum(c(v, 4L) * 2L)")?;
            region.decode::<i32, _>(value)
        })
    })
    .unwrap();
    assert_eq!(total, Ok(20));
}

#[test]
fn automatic_link_crosses_jobs() {
    ensure_runtime();
    let link = global::submit(|session| {
        session.with_region(|region| region.automatic(region.encode("kept across jobs")))
    })
    .unwrap();
    let text = global::submit(move |session| {
        session.with_region(|region| {
            let handle = region.adopt(&link)?;
            region.decode::<String, _>(handle)
        })
    })
    .unwrap();
    assert_eq!(text.as_deref(), Ok("kept across jobs"));
}

#[test]
fn submissions_from_many_threads_all_complete() {
    ensure_runtime();
    let handles: Vec<_> = (0..8)
        .map(|i| {
            std::thread::spawn(move || {
                global::submit(move |session| {
                    session.with_region(|region| {
                        let value = region.eval(&format!("{} * 10", i))?;
                        region.decode::<f64, _>(value)
                    })
                })
            })
        })
        .collect();
    let mut results: Vec<f64> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap().unwrap())
        .collect();
    results.sort_by(f64::total_cmp);
    assert_eq!(results, (0..8).map(|i| i as f64 * 10.0).collect::<Vec<_>>());
}
