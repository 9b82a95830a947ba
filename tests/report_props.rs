// ABOUTME: Property tests for report arithmetic.
// ABOUTME: Totals partition the items; the rate is order-independent.

use proptest::prelude::*;

use strato::checks::{Category, CheckPhase, CheckResult, Outcome};
use strato::report::ReportAggregator;

fn outcome_strategy() -> impl Strategy<Value = Outcome> {
    prop_oneof![
        Just(Outcome::Pass),
        Just(Outcome::Fail),
        Just(Outcome::Warn),
    ]
}

fn build_report(outcomes: &[Outcome]) -> strato::report::Report {
    let mut aggregator = ReportAggregator::new(CheckPhase::PreDeploy);
    for (i, outcome) in outcomes.iter().enumerate() {
        aggregator.record(CheckResult {
            name: format!("check-{i}"),
            category: Category::Security,
            outcome: *outcome,
            message: String::new(),
        });
    }
    aggregator.finalize()
}

proptest! {
    #[test]
    fn totals_partition_the_items(outcomes in prop::collection::vec(outcome_strategy(), 1..50)) {
        let report = build_report(&outcomes);

        prop_assert_eq!(report.total, outcomes.len());
        prop_assert_eq!(report.total, report.passed + report.failed + report.warned);
        prop_assert!(report.total >= 1);
    }

    #[test]
    fn success_rate_is_floored_integer_percentage(outcomes in prop::collection::vec(outcome_strategy(), 1..50)) {
        let report = build_report(&outcomes);

        let expected = report.passed * 100 / report.total;
        prop_assert_eq!(report.success_rate as usize, expected);
        prop_assert!(report.success_rate <= 100);
    }

    #[test]
    fn success_rate_is_independent_of_execution_order(outcomes in prop::collection::vec(outcome_strategy(), 1..50)) {
        let forward = build_report(&outcomes);

        let mut reversed = outcomes.clone();
        reversed.reverse();
        let backward = build_report(&reversed);

        prop_assert_eq!(forward.success_rate, backward.success_rate);
        prop_assert_eq!(forward.passed, backward.passed);
        prop_assert_eq!(forward.failed, backward.failed);
        prop_assert_eq!(forward.warned, backward.warned);
    }
}
