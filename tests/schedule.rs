use bch_consensus::{ActivationSchedule, RuleForks, ScriptLimits};

#[test]
fn partial_schedule_falls_back_to_mainnet() {
    let schedule: ActivationSchedule =
        serde_json::from_str(r#"{ "bch_gauss": 100, "bch_descartes": 200 }"#).unwrap();
    assert_eq!(schedule.bip16, ActivationSchedule::MAINNET.bip16);
    assert_eq!(schedule.bch_gauss, 100);

    let forks = schedule.forks_at(150);
    assert!(forks.contains(RuleForks::BCH_GAUSS));
    assert!(!forks.contains(RuleForks::BCH_DESCARTES));
    assert!(!forks.contains(RuleForks::BIP16));
    assert_eq!(ScriptLimits::for_forks(forks).max_number_size, 8);
}

#[test]
fn schedule_round_trips_through_json() {
    let json = serde_json::to_string(&ActivationSchedule::ALWAYS).unwrap();
    let decoded: ActivationSchedule = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, ActivationSchedule::ALWAYS);
    assert_eq!(decoded.forks_at(0), RuleForks::ALL);
}

#[test]
fn mainnet_upgrades_in_order() {
    let mainnet = ActivationSchedule::MAINNET;
    let mut previous = RuleForks::NONE;
    for height in [
        mainnet.bch_uahf,
        mainnet.bch_daa_cw144,
        mainnet.bch_pythagoras,
        mainnet.bch_euclid,
        mainnet.bch_pisano,
        mainnet.bch_mersenne,
        mainnet.bch_fermat,
        mainnet.bch_euler,
        mainnet.bch_gauss,
        mainnet.bch_descartes,
        mainnet.bch_lobachevski,
        mainnet.bch_galois,
    ] {
        let forks = mainnet.forks_at(height);
        assert!(forks.contains(previous));
        assert_ne!(forks, previous, "height {height}");
        previous = forks;
    }
    assert_eq!(previous, RuleForks::ALL);
}

#[test]
fn malformed_schedule_is_rejected() {
    let result = serde_json::from_str::<ActivationSchedule>(r#"{ "bch_gauss": "soon" }"#);
    assert!(result.is_err());
}
