use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use siding_framework::prelude::*;
use siding_framework::{AddonLoader, PLUGIN_TYPE};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

/// Counts ERROR events.
struct ErrorCounter(Arc<AtomicUsize>);

impl<S: Subscriber> Layer<S> for ErrorCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::ERROR {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

struct Ticker {
    ticks: Arc<AtomicUsize>,
    broken: bool,
}

impl Addon for Ticker {
    fn capabilities(&self) -> Capabilities {
        let ticks = self.ticks.clone();
        let broken = self.broken;
        Capabilities::new()
            .slot("on_tick", move |_, _| {
                if broken {
                    return Err("tick handler exploded".into());
                }
                ticks.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .signal("clicked")
    }
}

fn tickers(names: &[(&str, bool)]) -> (AddonManager, Arc<AtomicUsize>) {
    let manager = AddonManager::with_loader(AddonLoader::new());
    let ticks = Arc::new(AtomicUsize::new(0));
    for (name, broken) in names {
        manager.register(AddonDescriptor::new(PLUGIN_TYPE, *name)).unwrap();
        let ticks = ticks.clone();
        let broken = *broken;
        manager.register_factory(PLUGIN_TYPE, name, move |_| {
            Ok(Box::new(Ticker {
                ticks: ticks.clone(),
                broken,
            }) as Box<dyn Addon>)
        });
        manager.activate(PLUGIN_TYPE, name).unwrap();
    }
    (manager, ticks)
}

#[test]
fn test_failing_handler_does_not_stop_delivery() {
    let (manager, ticks) = tickers(&[("one", false), ("two", true), ("three", false)]);
    let errors = Arc::new(AtomicUsize::new(0));
    let subscriber = tracing_subscriber::registry().with(ErrorCounter(errors.clone()));

    let delivery = tracing::subscriber::with_default(subscriber, || manager.run_signal("on_tick", &[]));

    assert_eq!(delivery, Delivery { delivered: 2, failed: 1 });
    assert!(!delivery.is_clean());
    assert_eq!(ticks.load(Ordering::SeqCst), 2);
    assert_eq!(errors.load(Ordering::SeqCst), 1);
}

#[test]
fn test_application_signal_follows_activation() {
    let (manager, ticks) = tickers(&[("one", false), ("two", false)]);
    manager.add_signal("on_tick");

    assert_eq!(manager.emit_signal("on_tick", &[json!(1)]).delivered, 2);
    assert_eq!(manager.connections(PLUGIN_TYPE, "one"), vec!["on_tick"]);

    manager.deactivate(PLUGIN_TYPE, "two").unwrap();
    assert!(manager.connections(PLUGIN_TYPE, "two").is_empty());
    assert_eq!(manager.emit_signal("on_tick", &[]).delivered, 1);

    manager.activate(PLUGIN_TYPE, "two").unwrap();
    assert_eq!(manager.emit_signal("on_tick", &[]).delivered, 2);
    assert_eq!(ticks.load(Ordering::SeqCst), 5);
}

#[test]
fn test_addon_signal_reaches_application_slot() {
    let (manager, _) = tickers(&[("one", false)]);
    let received: Arc<Mutex<Vec<(String, Vec<Value>)>>> = Arc::default();
    let sink = received.clone();
    manager.add_slot("clicked", move |_, key, args| {
        sink.lock().push((key.name().to_string(), args.to_vec()));
        Ok(())
    });

    let one = AddonKey::new(PLUGIN_TYPE, "one");
    assert_eq!(manager.emit_from(&one, "clicked", &[json!("left")]).delivered, 1);
    assert_eq!(*received.lock(), vec![("one".to_string(), vec![json!("left")])]);

    manager.deactivate(PLUGIN_TYPE, "one").unwrap();
    assert_eq!(manager.emit_from(&one, "clicked", &[]), Delivery::default());
}
