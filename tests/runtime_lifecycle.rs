//! The process runtime moves through its states once, so this binary holds
//! a single sequential test.

use std::time::Duration;

use crossheap::{BridgeError, Config, Session, global};

#[test]
fn runtime_lifecycle_is_one_way() {
    assert!(!global::is_initialized());
    assert_eq!(global::submit(|_| ()).unwrap_err(), BridgeError::NotInitialized);
    assert_eq!(global::teardown().unwrap_err(), BridgeError::NotInitialized);

    global::initialize(Config::default().with_trace(true)).unwrap();
    assert!(global::is_initialized());
    assert_eq!(
        global::initialize(Config::default()).unwrap_err(),
        BridgeError::AlreadyInitialized
    );

    let answer = global::submit(|session| {
        session.with_region(|region| {
            let value = region.eval("6 * 7")?;
            region.decode::<f64, _>(value)
        })
    })
    .unwrap();
    assert_eq!(answer, Ok(42.0));

    let quick = global::submit_timeout(Duration::from_secs(5), |session| session.id()).unwrap();
    assert!(quick > 0);

    // Teardown from inside a job is refused.
    let nested = global::submit(|_| global::teardown()).unwrap();
    assert_eq!(nested, Err(BridgeError::Reentrant));
    let nested = global::submit(|_| global::submit(|_| ())).unwrap();
    assert_eq!(nested.unwrap_err(), BridgeError::Reentrant);

    let link = global::submit(|session| {
        session.with_region(|region| region.automatic(region.encode(vec![1.0, 2.0])))
    })
    .unwrap();

    global::teardown().unwrap();
    assert!(!global::is_initialized());
    assert_eq!(global::submit(|_| ()).unwrap_err(), BridgeError::TornDown);
    assert_eq!(global::teardown().unwrap_err(), BridgeError::TornDown);
    assert_eq!(
        global::initialize(Config::default()).unwrap_err(),
        BridgeError::TornDown
    );

    // A link from the torn-down runtime is inert: it cannot be adopted
    // elsewhere and dropping it is harmless.
    let local = Session::new(Config::default());
    local.with_region(|region| {
        assert_eq!(region.adopt(&link).unwrap_err(), BridgeError::UseAfterRegionRelease);
    });
    drop(link);
}
