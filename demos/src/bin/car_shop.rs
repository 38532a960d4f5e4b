//! Car shop demo.
//!
//! Sells a list of cars from a simulated frame loop. Each sale loads the car
//! asset through the streaming service, checks the model in a helper task and
//! waits for a "SellCar" montage to end, either through a host event or the
//! montage timeout.
//!
//! ```text
//! car_shop --cars cars/ferrari cars/fiat null --event blend-out --event-frame 12
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use corotasks_assets::{AssetError, AssetLoader, AssetPath, LoadPriority, MemoryStreamer, SoftRef};
use corotasks_core::{
    AsyncError, AsyncResult, CoroConfig, Task, Ticker, UnhandledErrorPolicy, awaitable,
};
use corotasks_runtime::{PendingActionRegistry, PlayAndWait, PlayOutcome};
use parking_lot::Mutex;

#[derive(Debug)]
struct Car {
    model: &'static str,
    price: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Sale {
    model: &'static str,
    price: u32,
    message: String,
}

/// Event the simulated host reports for the running montage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
enum HostEvent {
    /// Report nothing; the montage times out.
    #[default]
    None,
    Completed,
    BlendOut,
    Interrupted,
    Cancelled,
}

#[derive(Parser, Debug)]
#[command(
    name = "car_shop",
    about = "Sells cars from a simulated frame loop using coroutine tasks",
    version
)]
struct Args {
    /// Cars to sell, as asset paths. `null` stands for a null reference.
    #[arg(long, num_args = 1.., default_values = ["cars/ferrari", "cars/fiat"])]
    cars: Vec<String>,

    /// Stop after this many frames even if the shop is still busy.
    #[arg(long, default_value = "300")]
    max_frames: u64,

    /// Simulated frame time in seconds.
    #[arg(long, default_value = "0.033")]
    dt: f32,

    /// Length of the SellCar montage in seconds.
    #[arg(long, default_value = "1.5")]
    montage_length: f32,

    /// Play rate of the SellCar montage.
    #[arg(long, default_value = "1.0")]
    rate: f32,

    /// Event the host reports for the montage running at `--event-frame`.
    #[arg(long, default_value = "none", value_enum)]
    event: HostEvent,

    /// Frame at which `--event` is reported.
    #[arg(long, default_value = "20")]
    event_frame: u64,

    /// Log unhandled coroutine errors instead of panicking.
    #[arg(long)]
    log_unhandled: bool,
}

struct Shop {
    loader: AssetLoader,
    registry: Arc<PendingActionRegistry>,
    montage_length: f32,
    rate: f32,
    montage: Mutex<Option<Arc<PlayAndWait>>>,
}

impl Shop {
    fn report(&self, event: HostEvent) {
        let Some(montage) = self.montage.lock().clone() else {
            log::info!("no montage running, {event:?} ignored");
            return;
        };
        let accepted = match event {
            HostEvent::None => false,
            HostEvent::Completed => montage.on_completed(),
            HostEvent::BlendOut => montage.on_blend_out(),
            HostEvent::Interrupted => montage.on_interrupted(),
            HostEvent::Cancelled => montage.on_cancelled(),
        };
        log::info!("host reported {event:?} for {} (accepted: {accepted})", montage.name());
    }
}

fn is_ferrari(car: Arc<Car>) -> Task<bool> {
    Task::new(async move { Ok(car.model == "Ferrari") })
}

fn sell_car(shop: Arc<Shop>, reference: SoftRef<Car>) -> Task<Sale> {
    Task::new(async move {
        let car = shop
            .loader
            .load_single_object(&reference)
            .await?
            .ok_or_else(|| AsyncError::new("Car asset is null!"))?;
        let ferrari = is_ferrari(car.clone()).await?;

        let montage = Arc::new(PlayAndWait::new(
            &shop.registry,
            "SellCar",
            shop.montage_length,
            shop.rate,
        ));
        *shop.montage.lock() = Some(montage.clone());
        let outcome = awaitable(montage).await;
        shop.montage.lock().take();

        match outcome? {
            PlayOutcome::Interrupted | PlayOutcome::Cancelled | PlayOutcome::Destroyed => {
                Err(AsyncError::new(format!("the {} sale fell through", car.model)))
            }
            outcome => {
                log::debug!("SellCar montage ended with {outcome:?}");
                let message = if ferrari {
                    "Ferrari. Nice car!"
                } else {
                    "Not a Ferrari, still a car."
                };
                Ok(Sale {
                    model: car.model,
                    price: car.price,
                    message: message.to_string(),
                })
            }
        }
    })
}

fn open_shop(shop: Arc<Shop>, references: Vec<SoftRef<Car>>) -> Task<Vec<Sale>> {
    Task::new(async move {
        let mut sales = Vec::new();
        for reference in references {
            match sell_car(shop.clone(), reference.clone()).await {
                Ok(sale) => {
                    log::info!("sold {} for {}: {}", sale.model, sale.price, sale.message);
                    sales.push(sale);
                }
                Err(error) => log::warn!("could not sell {reference:?}: {error}"),
            }
        }
        Ok(sales)
    })
}

fn stock(streamer: &MemoryStreamer) -> Result<(), AssetError> {
    let cars = [
        ("cars/ferrari", Car { model: "Ferrari", price: 250_000 }),
        ("cars/fiat", Car { model: "Fiat", price: 15_000 }),
        ("cars/volvo", Car { model: "Volvo", price: 40_000 }),
    ];
    for (path, car) in cars {
        streamer.insert(AssetPath::new(path)?, car);
    }
    Ok(())
}

fn references(cars: &[String]) -> Result<Vec<SoftRef<Car>>, AssetError> {
    cars.iter()
        .map(|car| match car.as_str() {
            "null" => Ok(SoftRef::null()),
            path => SoftRef::parse(path),
        })
        .collect()
}

fn run(args: &Args) -> AsyncResult<Option<Vec<Sale>>> {
    let ticker = Ticker::new();
    let streamer = Arc::new(MemoryStreamer::new().with_requests_per_pump(1));
    stock(&streamer)?;
    streamer.attach(&ticker);

    let registry = Arc::new(PendingActionRegistry::new());
    registry.initialize(&ticker);

    let shop = Arc::new(Shop {
        loader: AssetLoader::new(streamer.clone()).with_priority(LoadPriority::High),
        registry: registry.clone(),
        montage_length: args.montage_length,
        rate: args.rate,
        montage: Mutex::new(None),
    });

    let mut task = open_shop(shop.clone(), references(&args.cars)?);
    task.launch();

    let mut frame = 0;
    while !task.is_completed() && frame < args.max_frames {
        if frame == args.event_frame && args.event != HostEvent::None {
            shop.report(args.event);
        }
        ticker.tick(args.dt);
        frame += 1;
    }
    log::info!(
        "stopped after {} frames ({:.2}s simulated, {} pending actions)",
        registry.clock().frames(),
        registry.elapsed(),
        registry.pending_count()
    );

    let sales = if task.is_completed() {
        task.take_result().transpose()?
    } else {
        None
    };
    registry.deinitialize(&ticker);
    Ok(sales)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    corotasks_core::init();
    if args.log_unhandled {
        CoroConfig::current()
            .with_unhandled_errors(UnhandledErrorPolicy::Log)
            .install();
    }

    match run(&args) {
        Ok(Some(sales)) => {
            let total: u64 = sales.iter().map(|s| u64::from(s.price)).sum();
            log::info!("{} cars sold, {total} total", sales.len());
            ExitCode::SUCCESS
        }
        Ok(None) => {
            log::warn!("shop still busy after {} frames", args.max_frames);
            ExitCode::FAILURE
        }
        Err(error) => {
            log::error!("{error}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        Args::parse_from(std::iter::once("car_shop").chain(extra.iter().copied()))
    }

    #[test]
    fn sells_every_car_on_timeout() {
        let sales = run(&args(&["--montage-length", "0.2"])).unwrap().unwrap();
        let models: Vec<_> = sales.iter().map(|s| s.model).collect();
        assert_eq!(models, vec!["Ferrari", "Fiat"]);
        assert_eq!(sales[0].message, "Ferrari. Nice car!");
    }

    #[test]
    fn null_car_is_skipped() {
        let sales = run(&args(&["--cars", "null", "cars/volvo", "--montage-length", "0.2"]))
            .unwrap()
            .unwrap();
        assert_eq!(sales.len(), 1);
        assert_eq!(sales[0].model, "Volvo");
    }

    #[test]
    fn interrupted_sale_falls_through() {
        let sales = run(&args(&["--cars", "cars/fiat", "--event", "interrupted", "--event-frame", "5"]))
            .unwrap()
            .unwrap();
        assert!(sales.is_empty());
    }

    #[test]
    fn invalid_path_is_an_error() {
        assert!(run(&args(&["--cars", "cars/../secret"])).is_err());
    }

    #[test]
    fn busy_shop_reports_none() {
        let outcome = run(&args(&["--max-frames", "3"])).unwrap();
        assert!(outcome.is_none());
    }
}
