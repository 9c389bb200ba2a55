mod common;

use api_client::{ApiError, TradingApi, UpdateEvent};
use common::*;
use engine::{
    ContractRoller, EngineError, FeedSettings, InstrumentTrader, RollCadence, Runner,
    RunnerSettings, SessionEnd,
};
use configuration::{InstrumentSpec, SizingParams};
use risk::{FixedSizer, InstrumentTable, PositionSizer, RiskBudgetSizer};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use strategies::Strategy;
use tokio_util::sync::CancellationToken;

fn settings() -> RunnerSettings {
    RunnerSettings {
        wait_deadline: Duration::from_secs(5),
        error_pause: Duration::from_secs(1),
        reconnect_backoff: Duration::from_secs(30),
        max_reconnect_attempts: 3,
    }
}

fn runner(strategy: &Arc<ScriptedStrategy>, cancel: CancellationToken) -> Runner {
    let strategy: Arc<dyn Strategy> = strategy.clone();
    let sizer: Arc<dyn PositionSizer> = Arc::new(FixedSizer::new(1).unwrap());
    let feed = FeedSettings {
        period_secs: 1800,
        window_len: 50,
    };
    let traders = ["CZCE.SA", "SHFE.rb"]
        .into_iter()
        .map(|symbol| {
            InstrumentTrader::new(
                ContractRoller::new(symbol, RollCadence::default()),
                Arc::clone(&strategy),
                Arc::clone(&sizer),
                feed,
            )
        })
        .collect();
    Runner::new(traders, settings(), cancel)
}

/// Soda ash cannot be sized (its code is missing from the table); rebar trades a fixed lot.
fn runner_with_failing_first_instrument(
    strategy: &Arc<ScriptedStrategy>,
    cancel: CancellationToken,
) -> Runner {
    let strategy: Arc<dyn Strategy> = strategy.clone();
    let table = InstrumentTable::new([InstrumentSpec {
        code: "SHFE.rb".to_string(),
        point_value: dec!(10),
        min_volume: 1,
    }]);
    let unsizable: Arc<dyn PositionSizer> =
        Arc::new(RiskBudgetSizer::new(SizingParams::default(), table, 2).unwrap());
    let fixed: Arc<dyn PositionSizer> = Arc::new(FixedSizer::new(1).unwrap());
    let feed = FeedSettings {
        period_secs: 1800,
        window_len: 50,
    };
    let traders = vec![
        InstrumentTrader::new(
            ContractRoller::new("CZCE.SA", RollCadence::default()),
            Arc::clone(&strategy),
            unsizable,
            feed,
        ),
        InstrumentTrader::new(
            ContractRoller::new("SHFE.rb", RollCadence::default()),
            strategy,
            fixed,
            feed,
        ),
    ];
    Runner::new(traders, settings(), cancel)
}

fn fake() -> Arc<FakeApi> {
    let fake = FakeApi::new();
    fake.set_main("CZCE.SA", "CZCE.SA601");
    fake.set_main("SHFE.rb", "SHFE.rb2510");
    fake
}

#[tokio::test(start_paused = true)]
async fn finished_feed_produces_a_report() {
    let fake = fake();
    let strategy = ScriptedStrategy::new();
    strategy.set(long_open());

    fake.push_bar("CZCE.SA601", bar(0, dec!(1000)));
    fake.script(Ok(UpdateEvent::Changed(changed(&["CZCE.SA601"]))));
    fake.script(Ok(UpdateEvent::Timeout));
    fake.push_bar("SHFE.rb2510", bar(30, dec!(3500)));
    fake.script(Ok(UpdateEvent::Changed(changed(&["SHFE.rb2510"]))));
    fake.script(Ok(UpdateEvent::Finished));

    let mut runner = runner(&strategy, CancellationToken::new());
    let report = runner.run(fake.clone()).await.unwrap();

    assert_eq!(report.end, SessionEnd::Finished);
    assert_eq!(report.final_balance, Some(dec!(100000)));
    assert_eq!(report.starting_balance, Some(dec!(100000)));
    assert_eq!(report.profit(), Some(dec!(0)));
    assert_eq!(report.total_trades(), 2);
    assert_eq!(report.instruments[0].symbol, "CZCE.SA");
    assert_eq!(report.instruments[0].contract.as_deref(), Some("CZCE.SA601"));
    assert_eq!(report.instruments[1].contract.as_deref(), Some("SHFE.rb2510"));
    assert!(fake.is_closed());
}

#[tokio::test(start_paused = true)]
async fn per_bar_errors_do_not_end_the_session() {
    let fake = fake();
    let strategy = ScriptedStrategy::new();
    strategy.set(long_open());
    fake.reject_orders(true);

    fake.push_bar("CZCE.SA601", bar(0, dec!(1000)));
    fake.script(Ok(UpdateEvent::Changed(changed(&["CZCE.SA601"]))));
    fake.script(Ok(UpdateEvent::Finished));

    let mut runner = runner(&strategy, CancellationToken::new());
    let report = runner.run(fake.clone()).await.unwrap();

    assert_eq!(report.end, SessionEnd::Finished);
    assert_eq!(report.total_trades(), 0);
    assert!(fake.orders().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_a_waiting_session() {
    let fake = fake();
    let strategy = ScriptedStrategy::new();
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(60)).await;
        trigger.cancel();
    });

    // Nothing is scripted, so `wait_update` never returns on its own.
    let mut runner = runner(&strategy, cancel);
    let report = runner.run(fake.clone()).await.unwrap();

    assert_eq!(report.end, SessionEnd::Cancelled);
    assert!(fake.is_closed());
}

#[tokio::test(start_paused = true)]
async fn failing_connector_is_retried_a_bounded_number_of_times() {
    let strategy = ScriptedStrategy::new();
    let attempts = Arc::new(AtomicU32::new(0));

    let mut runner = runner(&strategy, CancellationToken::new());
    let counter = Arc::clone(&attempts);
    let result = runner
        .supervise(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<Arc<dyn TradingApi>, _>(EngineError::ApiClient(ApiError::Closed))
            }
        })
        .await;

    assert!(matches!(
        result,
        Err(EngineError::ReconnectExhausted { attempts: 3, .. })
    ));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn faulted_session_is_reopened_flat() {
    let strategy = ScriptedStrategy::new();
    strategy.set(long_open());

    let first = fake();
    first.push_bar("CZCE.SA601", bar(0, dec!(1000)));
    first.script(Ok(UpdateEvent::Changed(changed(&["CZCE.SA601"]))));
    first.script(Err(ApiError::Closed));

    let second = fake();
    second.script(Ok(UpdateEvent::Finished));

    let sessions: Vec<Arc<FakeApi>> = vec![first.clone(), second.clone()];
    let next = Arc::new(AtomicU32::new(0));
    let mut runner = runner(&strategy, CancellationToken::new());
    let report = runner
        .supervise(move || {
            let index = next.fetch_add(1, Ordering::SeqCst) as usize;
            let api: Arc<dyn TradingApi> = sessions[index].clone();
            async move { Ok(api) }
        })
        .await
        .unwrap();

    assert_eq!(report.end, SessionEnd::Finished);
    assert!(first.is_closed());
    assert!(second.is_closed());
    // The entry from the first session is counted, but the new session starts flat.
    assert_eq!(report.total_trades(), 1);
    assert!(report.instruments.iter().all(|i| i.side.is_flat()));
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_backoff_ends_supervision() {
    let strategy = ScriptedStrategy::new();
    let cancel = CancellationToken::new();
    let mut runner = runner(&strategy, cancel.clone());

    let report = runner
        .supervise(move || {
            // Cancel on the first attempt; the backoff sleep must notice.
            cancel.cancel();
            async { Err::<Arc<dyn TradingApi>, _>(EngineError::ApiClient(ApiError::Closed)) }
        })
        .await
        .unwrap();

    assert_eq!(report.end, SessionEnd::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn replay_does_not_pause_after_a_per_bar_error() {
    let fake = fake();
    let strategy = ScriptedStrategy::new();
    strategy.set(long_open());

    fake.push_bar("CZCE.SA601", bar(0, dec!(1000)));
    fake.push_bar("SHFE.rb2510", bar(0, dec!(3500)));
    fake.script(Ok(UpdateEvent::Changed(changed(&["CZCE.SA601", "SHFE.rb2510"]))));
    fake.script(Ok(UpdateEvent::Finished));

    let mut runner = runner_with_failing_first_instrument(&strategy, CancellationToken::new());
    let report = runner.run(fake.clone()).await.unwrap();

    assert_eq!(report.end, SessionEnd::Finished);
    assert_eq!(fake.orders(), vec![("SHFE.rb2510".to_string(), 1)]);
    // The paused clock only moves when something sleeps.
    assert!(report.elapsed < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_error_pause_still_finishes_the_update() {
    let fake = fake();
    let strategy = ScriptedStrategy::new();
    strategy.set(long_open());
    let cancel = CancellationToken::new();

    fake.push_bar("CZCE.SA601", bar(0, dec!(1000)));
    fake.push_bar("SHFE.rb2510", bar(0, dec!(3500)));
    fake.script(Ok(UpdateEvent::Changed(changed(&["CZCE.SA601", "SHFE.rb2510"]))));

    // Fires one second into the five second pause that follows the soda ash error.
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let mut runner = runner_with_failing_first_instrument(&strategy, cancel);
    let session: Arc<dyn TradingApi> = fake.clone();
    let report = runner
        .supervise(move || {
            let api = Arc::clone(&session);
            async move { Ok(api) }
        })
        .await
        .unwrap();

    assert_eq!(report.end, SessionEnd::Cancelled);
    // Rebar still saw the update after the pause was cut short.
    assert_eq!(fake.orders(), vec![("SHFE.rb2510".to_string(), 1)]);
    assert_eq!(report.instruments[1].stats.total_trades, 1);
    assert!(report.elapsed < Duration::from_secs(5));
    assert!(fake.is_closed());
}
