use crossheap::{BridgeError, Complex, Config, Form, Logical, Session, TaggedView};
use insta::assert_snapshot;

fn session() -> Session {
    Session::new(Config::default())
}

#[test]
fn ten_thousand_doubles_round_trip() {
    let data: Vec<f64> = (0..10_000).map(|i| i as f64 * 0.25 - 7.0).collect();
    let session = session();
    let back = session.with_region(|region| {
        let handle = region.encode(data.clone());
        assert_eq!(region.length(handle), 10_000);
        region.decode::<Vec<f64>, _>(handle).unwrap()
    });
    assert_eq!(back, data);
}

#[test]
fn empty_and_single_element_vectors() {
    session().with_region(|region| {
        let empty = region.encode(Vec::<f64>::new());
        assert_eq!(region.length(empty), 0);
        assert!(region.decode::<Vec<f64>, _>(empty).unwrap().is_empty());

        let single = region.encode(vec![42.0]);
        assert_eq!(region.decode::<f64, _>(single).unwrap(), 42.0);
        assert_eq!(region.decode::<Vec<f64>, _>(single).unwrap(), vec![42.0]);
    });
}

#[test]
fn slices_are_copied() {
    let source = [1, 2, 3];
    session().with_region(|region| {
        let handle = region.encode(&source[..]);
        let alias = region.alias::<i32, _>(handle).unwrap();
        alias.set(0, 10);
        assert_eq!(alias.to_vec(), vec![10, 2, 3]);
    });
    assert_eq!(source, [1, 2, 3]);
}

#[test]
fn each_atomic_form_round_trips() {
    session().with_region(|region| {
        let ints = region.encode(vec![1, -2, i32::MAX]);
        assert_eq!(region.form_of(ints), Form::Int);
        assert_eq!(region.decode::<Vec<i32>, _>(ints).unwrap(), vec![1, -2, i32::MAX]);

        let flags = region.encode(vec![true, false]);
        assert_eq!(region.decode::<Vec<bool>, _>(flags).unwrap(), vec![true, false]);

        let three = region.encode(vec![Logical::True, Logical::Na, Logical::False]);
        assert_eq!(
            region.decode::<Vec<Logical>, _>(three).unwrap(),
            vec![Logical::True, Logical::Na, Logical::False]
        );

        let z = region.encode(Complex::new(1.0, -2.0));
        assert_eq!(region.form_of(z), Form::Complex);
        assert_eq!(region.decode::<Complex, _>(z).unwrap(), Complex::new(1.0, -2.0));

        let bytes = region.encode(vec![0u8, 255, 7]);
        assert_eq!(region.form_of(bytes), Form::Raw);
        assert_eq!(region.decode::<Vec<u8>, _>(bytes).unwrap(), vec![0, 255, 7]);

        let null = region.encode(());
        assert!(null.is_nil());
        region.decode::<(), _>(null).unwrap();
    });
}

#[test]
fn strings_and_missing_text() {
    session().with_region(|region| {
        let words = region.encode(vec!["alpha".to_string(), "beta".to_string()]);
        assert_eq!(region.form_of(words), Form::String);
        assert_eq!(
            region.decode::<Vec<String>, _>(words).unwrap(),
            vec!["alpha", "beta"]
        );

        let gappy = region.encode(vec![Some("a".to_string()), None]);
        assert_eq!(
            region.decode::<Vec<Option<String>>, _>(gappy).unwrap(),
            vec![Some("a".to_string()), None]
        );
        assert_eq!(
            region.decode::<Vec<String>, _>(gappy).unwrap_err(),
            BridgeError::MissingValue { form: Form::String }
        );

        let na = region.encode(None::<String>);
        assert_eq!(region.decode::<Option<String>, _>(na).unwrap(), None);
        // The text "NA" is an ordinary string.
        let text = region.encode("NA");
        assert_eq!(region.decode::<Option<String>, _>(text).unwrap().as_deref(), Some("NA"));
    });
}

#[test]
fn missing_scalars_map_to_none() {
    session().with_region(|region| {
        let real = region.encode(None::<f64>);
        assert_eq!(region.decode::<Option<f64>, _>(real).unwrap(), None);
        let int = region.encode(None::<i32>);
        assert_eq!(region.decode::<Option<i32>, _>(int).unwrap(), None);
        let flag = region.encode(None::<bool>);
        assert_eq!(region.decode::<Option<bool>, _>(flag).unwrap(), None);
        assert_eq!(
            region.decode::<bool, _>(flag).unwrap_err(),
            BridgeError::MissingValue { form: Form::Logical }
        );
        assert_eq!(region.decode::<Option<f64>, _>(region.encode(0.5)).unwrap(), Some(0.5));
    });
}

#[test]
fn scalar_decode_requires_length_one() {
    session().with_region(|region| {
        let three = region.encode(vec![1.0, 2.0, 3.0]);
        let err = region.decode::<f64, _>(three).unwrap_err();
        assert_eq!(err, BridgeError::LengthMismatch { expected: 1, actual: 3 });
        assert_snapshot!(err.render(), @"error[E2021]: expected a vector of length 1, got length 3");
    });
}

#[test]
fn decode_refuses_other_forms() {
    session().with_region(|region| {
        let ints = region.encode(vec![1, 2]);
        let err = region.decode::<Vec<f64>, _>(ints).unwrap_err();
        assert_snapshot!(err.render(), @"error[E2020]: expected a double value, got integer");
        assert!(region.decode::<String, _>(ints).is_err());
        assert!(region.decode::<(), _>(ints).is_err());
    });
}

#[test]
fn encoded_vector_views_as_its_form() {
    session().with_region(|region| {
        let handle = region.encode(vec![2.0, 3.0]);
        match region.view(handle) {
            TaggedView::Real(values) => assert_eq!(values.to_vec(), vec![2.0, 3.0]),
            other => panic!("unexpected view {:?}", other),
        }
    });
}
