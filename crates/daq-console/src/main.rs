//! DAQ operator console
//!
//! Line-oriented front end for a DAQ board on a serial port. Device traffic
//! runs on a background dispatcher; events are printed as they arrive.

mod input;
mod operator;

use anyhow::{Context, Result};
use daq_core::config::ConsoleSettings;
use daq_core::dispatch::Dispatcher;
use daq_core::events::{EventLog, EventSink};
use daq_core::protocol::{list_ports, Client, Command, Transport};
use input::{Input, HELP};
use operator::TerminalOperator;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

struct Console {
    runtime: Runtime,
    settings: ConsoleSettings,
    settings_path: Option<PathBuf>,
    client: Arc<Client>,
    log: EventLog,
    dispatcher: Dispatcher,
}

impl Console {
    fn new(settings: ConsoleSettings, settings_path: Option<PathBuf>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("daq-worker")
            .build()
            .context("failed to start async runtime")?;

        let transport = Arc::new(Transport::default().with_settle_delay(settings.connection.settle_delay()));
        let client = Arc::new(Client::new(transport).with_default_timeout(settings.connection.read_timeout()));
        let log = match settings.event_log_capacity {
            Some(capacity) => EventLog::with_capacity(capacity),
            None => EventLog::new(),
        };

        let mut events = log.subscribe();
        runtime.spawn(async move {
            while let Some(event) = events.recv().await {
                println!("{event}");
            }
        });

        let dispatcher = Dispatcher::spawn(
            runtime.handle(),
            Arc::clone(&client),
            Arc::new(log.clone()),
            settings.workflow.clone(),
        );

        Ok(Self {
            runtime,
            settings,
            settings_path,
            client,
            log,
            dispatcher,
        })
    }

    /// Handle one line; returns false once the operator quits
    fn handle(&mut self, input: Input) -> bool {
        match input {
            Input::Empty => {}
            Input::Help => println!("{HELP}"),
            Input::Ports => self.print_ports(),
            Input::Connect { port, baud_rate } => self.connect(port, baud_rate),
            Input::Disconnect => {
                if self.client.is_connected() {
                    self.client.transport().close();
                    self.log.append_plain("Disconnected");
                } else {
                    println!("Not connected");
                }
            }
            Input::Status => match self.client.transport().params() {
                Some(params) => println!("Connected to {} @ {}", params.port, params.baud_rate),
                None => println!("Not connected"),
            },
            Input::Led(level) => {
                self.dispatcher.send(Command::set_led(level).to_string(), None);
            }
            Input::Calibrate => self.calibrate(),
            Input::FullTest { record } => self.full_test(record),
            Input::Log => {
                for event in self.log.snapshot() {
                    println!("{event}");
                }
            }
            Input::Quit => return false,
            Input::Raw(line) => {
                self.dispatcher.send(line, None);
            }
        }
        true
    }

    fn print_ports(&self) {
        let ports = list_ports();
        if ports.is_empty() {
            println!("No serial ports found");
        }
        for port in ports {
            match port.product {
                Some(product) => println!("  {} ({product})", port.name),
                None => println!("  {}", port.name),
            }
        }
    }

    fn connect(&mut self, port: Option<String>, baud_rate: Option<u32>) {
        let port = port
            .or_else(|| self.settings.connection.port.clone())
            .or_else(|| list_ports().into_iter().next().map(|p| p.name));
        let Some(port) = port else {
            println!("No port given and none detected");
            return;
        };
        let baud_rate = baud_rate.unwrap_or(self.settings.connection.baud_rate);

        let opened = self
            .client
            .transport()
            .open(&port, baud_rate, self.settings.connection.read_timeout());
        match opened {
            Ok(()) => {
                self.log.append_plain(&format!("Connected to {port} @ {baud_rate}"));
                self.settings.connection.port = Some(port);
                self.settings.connection.baud_rate = baud_rate;
                self.save_settings();
            }
            Err(e) => {
                self.log.append_plain(&format!("Connection failed: {e}"));
            }
        }
    }

    fn calibrate(&self) {
        let receipt = self.dispatcher.calibrate(Arc::new(TerminalOperator));
        // The operator answers on this terminal, so wait for the job.
        match receipt.blocking_recv() {
            Ok(Ok(outcome)) => tracing::debug!("calibration finished: {outcome:?}"),
            Ok(Err(e)) => println!("Calibration aborted: {e}"),
            Err(_) => println!("Calibration did not complete"),
        }
    }

    fn full_test(&self, record: Option<bool>) {
        let record = record.unwrap_or(self.settings.workflow.record_by_default);
        let receipt = self.dispatcher.full_test(record);
        let log = self.log.clone();
        self.runtime.spawn(async move {
            if let Ok(Ok(report)) = receipt.await {
                let answered = report.steps.iter().filter(|s| s.result.is_ok()).count();
                log.append_plain(&format!(
                    "Full test finished: {answered}/{} steps answered",
                    report.steps.len()
                ));
            }
        });
    }

    fn save_settings(&self) {
        let Some(path) = &self.settings_path else {
            return;
        };
        if let Err(e) = self.settings.save(path) {
            tracing::warn!("could not save settings to {}: {e}", path.display());
        }
    }

    fn shutdown(self) {
        self.client.transport().close();
        // Background jobs are not awaited.
        self.runtime.shutdown_background();
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let settings_path = ConsoleSettings::default_path();
    let settings = settings_path
        .as_deref()
        .map(ConsoleSettings::load_or_default)
        .unwrap_or_default();

    let mut console = Console::new(settings, settings_path)?;
    println!("DAQ console {}. Type 'help' for commands.", daq_core::VERSION);

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        io::stdout().flush().context("failed to write prompt")?;

        line.clear();
        if stdin.lock().read_line(&mut line).context("failed to read input")? == 0 {
            break;
        }
        match Input::parse(&line) {
            Ok(input) => {
                if !console.handle(input) {
                    break;
                }
            }
            Err(e) => println!("{e}"),
        }
    }

    console.shutdown();
    Ok(())
}
