use num_bigint::BigInt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use ddh_psi_sum::error::{ParameterError, ProtocolStateError};
use ddh_psi_sum::{
    plaintext_intersection_sum, run_protocol, run_protocol_with, CurvePoint, EllipticCurveGroup, Error,
    Party1, Party1State, Party2, Party2State, PaillierPublicKey, ProtocolConfig, Round1Message,
    Round2Message, Round3Message,
};

// seeded StdRng, which is a CryptoRng unlike ark_std::test_rng()
fn test_rng() -> StdRng {
    StdRng::seed_from_u64(0x5eed)
}

// 512-bit moduli keep key generation quick in debug builds
fn fast_config() -> ProtocolConfig {
    ProtocolConfig::default().with_paillier_key_bits(512)
}

fn run_fast(set_v: &[&str], set_w: &[(&str, i64)]) -> (usize, BigInt) {
    let output = run_protocol_with(&fast_config(), set_v, set_w, &mut test_rng()).unwrap();
    (output.intersection_size, output.intersection_sum)
}

#[test]
fn test_fruit_sets() {
    // private set of party1
    let set_v = ["apple", "banana", "cherry", "date"];

    // private pairs of party2
    let set_w = [("apple", 10), ("banana", 20), ("grape", 30), ("date", 40)];

    let output = run_protocol(&set_v, &set_w).unwrap();
    assert_eq!(output.intersection_size, 3);
    assert_eq!(output.intersection_sum, BigInt::from(70));
    assert_eq!(output, plaintext_intersection_sum(&set_v, &set_w));
}

#[test]
fn test_single_element() {
    assert_eq!(run_fast(&["a"], &[("a", 100)]), (1, BigInt::from(100)));
}

#[test]
fn test_disjoint_sets() {
    assert_eq!(run_fast(&["a", "b"], &[("c", 10), ("d", 20)]), (0, BigInt::from(0)));
}

#[test]
fn test_empty_sets() {
    assert_eq!(run_fast(&[], &[]), (0, BigInt::from(0)));
    assert_eq!(run_fast(&["a", "b"], &[]), (0, BigInt::from(0)));
    assert_eq!(run_fast(&[], &[("a", 5)]), (0, BigInt::from(0)));
}

#[test]
fn test_full_overlap() {
    let set_v = ["user1", "user2", "user3"];
    let set_w = [("user1", 100), ("user2", 200), ("user3", 300)];
    assert_eq!(run_fast(&set_v, &set_w), (3, BigInt::from(600)));
}

#[test]
fn test_zero_and_negative_values() {
    assert_eq!(run_fast(&["user1", "user2"], &[("user1", 0), ("user2", 100)]), (2, BigInt::from(100)));
    assert_eq!(run_fast(&["user1", "user2"], &[("user1", -50), ("user2", 100)]), (2, BigInt::from(50)));
    assert_eq!(run_fast(&["x", "y"], &[("x", -7), ("y", -8), ("z", 1)]), (2, BigInt::from(-15)));
}

#[test]
fn test_large_values() {
    let set_w = [("big", i64::MAX), ("bigger", i64::MAX), ("small", i64::MIN)];
    let (size, sum) = run_fast(&["big", "bigger"], &set_w);
    assert_eq!(size, 2);
    assert_eq!(sum, BigInt::from(i64::MAX) * 2);
}

#[test]
fn test_duplicate_identifiers() {
    // duplicates in V collapse
    let set_v = ["user1", "user1", "user2"];
    let set_w = [("user1", 100), ("user2", 200)];
    assert_eq!(run_fast(&set_v, &set_w), (2, BigInt::from(300)));

    // W is a map, the clear computation keeps the last value
    let set_w = [("x", 1), ("x", 2)];
    let expected = plaintext_intersection_sum(&["x"], &set_w);
    assert_eq!((expected.intersection_size, expected.intersection_sum), (1, BigInt::from(2)));
}

#[test]
fn test_party2_rejects_repeated_identifier() {
    let mut rng = test_rng();
    let mut party1 = Party1::new(fast_config()).unwrap();
    let mut party2 = Party2::new(fast_config()).unwrap();
    party2.setup(&mut rng).unwrap();

    let round1 = party1.round1_prepare_data(&["x"], &mut rng).unwrap();
    let set_w = [("x", 1), ("y", 7), ("x", 2)];
    assert_eq!(
        party2.round2_process_and_respond(&round1, &set_w, &mut rng),
        Err(Error::Parameter(ParameterError::DuplicateIdentifier { index: 2 }))
    );
    assert_eq!(party2.state(), Party2State::Aborted);

    assert!(run_protocol_with(&fast_config(), &["x"], &set_w, &mut rng).is_err());
}

#[test]
fn test_matches_plaintext_reference_on_random_sets() {
    let mut rng = StdRng::seed_from_u64(7);
    for round in 0..4 {
        let v_len = rng.gen_range(0..12);
        let w_len = rng.gen_range(0..12);
        let set_v: Vec<String> = (0..v_len).map(|_| format!("user{}", rng.gen_range(0..20))).collect();
        let set_w: Vec<(String, i64)> = (0..w_len)
            .map(|i| (format!("user{}", 2 * i + round), rng.gen_range(-1000..1000)))
            .collect();

        let output = run_protocol_with(&fast_config(), &set_v, &set_w, &mut rng).unwrap();
        assert_eq!(output, plaintext_intersection_sum(&set_v, &set_w));
    }
}

#[test]
fn test_repeated_sessions_agree() {
    let set_v = ["user1", "user2", "user3"];
    let set_w = [("user1", 100), ("user2", 200), ("user4", 300)];
    let mut rng = test_rng();
    for _ in 0..3 {
        let output = run_protocol_with(&fast_config(), &set_v, &set_w, &mut rng).unwrap();
        assert_eq!((output.intersection_size, output.intersection_sum), (2, BigInt::from(300)));
    }
}

#[test]
fn test_independent_sessions_run_in_parallel() {
    let set_v = ["a", "b", "c"];
    let set_w = [("a", 1), ("c", 3), ("e", 5)];

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..2u64)
            .map(|seed| {
                scope.spawn(move || {
                    let mut rng = StdRng::seed_from_u64(seed);
                    run_protocol_with(&fast_config(), &set_v, &set_w, &mut rng).unwrap()
                })
            })
            .collect();
        for handle in handles {
            let output = handle.join().unwrap();
            assert_eq!(output.intersection_size, 2);
            assert_eq!(output.intersection_sum, BigInt::from(4));
        }
    });
}

#[test]
fn test_round1_output_is_randomized() {
    let group = EllipticCurveGroup::default();
    let set_v: Vec<String> = (0..10).map(|i| format!("user{}", i)).collect();
    let mut rng = test_rng();

    let mut first = Party1::new(fast_config()).unwrap();
    let mut second = Party1::new(fast_config()).unwrap();
    let a = first.round1_prepare_data(&set_v, &mut rng).unwrap();
    let b = second.round1_prepare_data(&set_v, &mut rng).unwrap();

    assert_eq!(a.masked_points.len(), set_v.len());
    assert_eq!(b.masked_points.len(), set_v.len());
    for point in a.masked_points.iter().chain(&b.masked_points) {
        assert!(group.is_on_curve(point));
        assert!(!point.is_identity());
    }
    // fresh k1 per session, so no point is shared
    assert!(a.masked_points.iter().all(|p| !b.masked_points.contains(p)));
}

#[test]
fn test_step_by_step_over_bytes() {
    let mut rng = test_rng();
    let set_v = ["apple", "banana", "cherry", "date"];
    let set_w = [("apple", 10), ("banana", 20), ("grape", 30), ("date", 40)];

    let mut party1 = Party1::new(fast_config()).unwrap();
    let mut party2 = Party2::new(fast_config()).unwrap();

    /* party2 publishes its public key */
    let public_key = party2.setup(&mut rng).unwrap();
    let public_key = PaillierPublicKey::from_bytes(&public_key.to_bytes()).unwrap();
    assert_eq!(party2.state(), Party2State::Setup);

    /* party1 sends H(v)^k1 to party2 */
    let round1 = party1.round1_prepare_data(&set_v, &mut rng).unwrap();
    let round1 = Round1Message::from_bytes(&round1.to_bytes().unwrap()).unwrap();
    assert_eq!(party1.state(), Party1State::Round1Sent);

    /* party2 sends Z and (H(w)^k2, Enc(t)) to party1 */
    let round2 = party2.round2_process_and_respond(&round1, &set_w, &mut rng).unwrap();
    assert_eq!(round2.doubly_masked_points.len(), 4);
    assert_eq!(round2.masked_values.len(), 4);
    let round2 = Round2Message::from_bytes(&round2.to_bytes(&public_key).unwrap(), &public_key).unwrap();
    party1.round2_receive(round2).unwrap();
    assert_eq!(party1.state(), Party1State::Round2Received);

    /* party1 sends the count and Enc(sum) to party2 */
    let round3 = party1.round3_compute_intersection(&public_key, &mut rng).unwrap();
    let round3 = Round3Message::from_bytes(&round3.to_bytes(&public_key).unwrap(), &public_key).unwrap();
    assert_eq!(party1.state(), Party1State::Round3Computed);

    let sum = party2.round3_decrypt_result(&round3).unwrap();
    assert_eq!(party2.state(), Party2State::Terminal);
    assert_eq!((round3.intersection_size, sum), (3, BigInt::from(70)));
}

#[test]
fn test_rounds_out_of_order_fail_closed() {
    let mut rng = test_rng();

    let mut party1 = Party1::new(fast_config()).unwrap();
    let mut party2 = Party2::new(fast_config()).unwrap();
    let public_key = party2.setup(&mut rng).unwrap();

    let error = party1.round3_compute_intersection(&public_key, &mut rng).unwrap_err();
    assert_eq!(
        error,
        Error::ProtocolState(ProtocolStateError {
            role: "party1",
            operation: "round3_compute_intersection",
            state: "Init",
        })
    );
    // the session is gone, even the first round is refused now
    assert_eq!(party1.state(), Party1State::Aborted);
    assert!(party1.round1_prepare_data(&["a"], &mut rng).is_err());

    // setup twice
    assert!(matches!(party2.setup(&mut rng), Err(Error::ProtocolState(_))));
    assert_eq!(party2.state(), Party2State::Aborted);

    let mut party2 = Party2::new(fast_config()).unwrap();
    let round1 = Round1Message { masked_points: vec![] };
    let set_w: [(&str, i64); 0] = [];
    assert!(party2.round2_process_and_respond(&round1, &set_w, &mut rng).is_err());

    let mut party2 = Party2::new(fast_config()).unwrap();
    party2.setup(&mut rng).unwrap();
    let fake = Round3Message {
        intersection_size: 0,
        aggregate: public_key.encrypt(&0u32.into(), &mut rng),
    };
    assert!(party2.round3_decrypt_result(&fake).is_err());
}

#[test]
fn test_abort_ends_session() {
    let mut rng = test_rng();
    let mut party2 = Party2::new(fast_config()).unwrap();
    party2.setup(&mut rng).unwrap();
    party2.abort();
    assert_eq!(party2.state(), Party2State::Aborted);

    let round1 = Round1Message { masked_points: vec![CurvePoint::Identity] };
    assert!(party2.round2_process_and_respond(&round1, &[("a", 1)], &mut rng).is_err());
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = ProtocolConfig::default().with_paillier_key_bits(100);
    assert!(matches!(Party1::new(config), Err(Error::Parameter(_))));
    assert!(matches!(Party2::new(config), Err(Error::Parameter(_))));
    assert!(run_protocol_with(&config, &["a"], &[("a", 1)], &mut test_rng()).is_err());
}
