//! proxlink firmware
//!
//! Runs one proxlink node on an ESP32 over ESP-NOW broadcast frames and
//! streams protocol reports as NDJSON over serial. The role is fixed at
//! build time: `--features provider` builds a light-sensor provider,
//! anything else a requester.

#![no_std]
#![no_main]

use esp_backtrace as _;

esp_bootloader_esp_idf::esp_app_desc!();

use core::sync::atomic::{AtomicBool, Ordering};
use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Instant, Timer};
use esp_hal::analog::adc::{Adc, AdcConfig, AdcPin, Attenuation};
use esp_hal::interrupt::software::SoftwareInterruptControl;
use esp_hal::peripherals::ADC1;
use esp_hal::timer::timg::TimerGroup;
use esp_hal::Blocking;
use esp_radio::esp_now::{EspNowReceiver, EspNowSender, BROADCAST_ADDRESS};
use esp_radio::wifi::WifiController;
use static_cell::StaticCell;

use proxlink::board;
use proxlink::packet::{NodeId, PACKET_LEN};
use proxlink::platform::{Event, Events, LightSensor, Millis, Radio, ReportSink, RxFrame};
use proxlink::report::{self, Report, ReportBuffer, VERSION};
use proxlink::{Node, NodeConfig};

// ── Board wiring ─────────────────────────────────────────────────────

#[cfg(feature = "board-m5stickc")]
type LightPin = esp_hal::peripherals::GPIO36<'static>;
#[cfg(not(feature = "board-m5stickc"))]
type LightPin = esp_hal::peripherals::GPIO1<'static>;

// ── Channel type aliases ─────────────────────────────────────────────

type RxChannel = Channel<CriticalSectionRawMutex, RxFrame, 8>;
type TxChannel = Channel<CriticalSectionRawMutex, [u8; PACKET_LEN], 4>;
type OutputChannel = Channel<CriticalSectionRawMutex, ReportBuffer, 8>;

// ── Static channels and shared state ─────────────────────────────────

/// Frames received over ESP-NOW, waiting for the node
static RX_CHANNEL: RxChannel = Channel::new();

/// Encoded frames waiting to be broadcast
static TX_CHANNEL: TxChannel = Channel::new();

/// Serialized NDJSON reports
static OUTPUT_CHANNEL: OutputChannel = Channel::new();

/// Whether the node currently has the radio switched on. Frames that arrive
/// while off are dropped in the receive task.
static RADIO_ON: AtomicBool = AtomicBool::new(false);

// ── Platform ─────────────────────────────────────────────────────────

/// The node's view of the board: channels to the radio tasks, the embassy
/// clock, and the light sensor ADC.
struct Board {
    adc: Adc<'static, ADC1<'static>, Blocking>,
    light: AdcPin<LightPin, ADC1<'static>>,
}

impl Radio for Board {
    fn on(&mut self) {
        if !RADIO_ON.swap(true, Ordering::Relaxed) {
            log::trace!("Radio on");
        }
    }

    fn off(&mut self) {
        if RADIO_ON.swap(false, Ordering::Relaxed) {
            log::trace!("Radio off");
        }
        // Nothing queued before power-down may be delivered afterwards
        while RX_CHANNEL.try_receive().is_ok() {}
    }

    fn broadcast(&mut self, frame: &[u8; PACKET_LEN]) {
        if !RADIO_ON.load(Ordering::Relaxed) {
            log::warn!("Broadcast with radio off, dropped");
            return;
        }
        if TX_CHANNEL.try_send(*frame).is_err() {
            log::debug!("TX queue full, frame dropped");
        }
    }
}

impl Events for Board {
    fn now(&self) -> Millis {
        Instant::now().as_millis()
    }

    async fn next_event(&mut self, deadline: Millis) -> Event {
        let alarm = Timer::at(Instant::from_millis(deadline));
        match select(alarm, RX_CHANNEL.receive()).await {
            Either::First(()) => Event::Alarm,
            Either::Second(frame) => Event::Frame(frame),
        }
    }
}

impl LightSensor for Board {
    fn read(&mut self) -> Option<u32> {
        let raw = u32::from(self.adc.read_blocking(&mut self.light));
        (raw <= board::ADC_MAX).then_some(raw)
    }
}

impl ReportSink for Board {
    fn report(&mut self, report: &Report) {
        match report::to_buffer(report) {
            Some(buf) => {
                let _ = OUTPUT_CHANNEL.try_send(buf);
            }
            None => log::warn!("Report too large to serialize: {:?}", report),
        }
    }
}

/// Node id from the factory MAC: the low four bytes, big-endian.
fn node_id() -> NodeId {
    let mac = esp_hal::efuse::Efuse::read_base_mac_address();
    u32::from_be_bytes([mac[2], mac[3], mac[4], mac[5]])
}

fn node_config() -> NodeConfig {
    if cfg!(feature = "provider") {
        NodeConfig::provider()
    } else {
        NodeConfig::requester()
    }
}

// ── Entry point ──────────────────────────────────────────────────────

#[esp_rtos::main]
async fn main(spawner: embassy_executor::Spawner) {
    esp_println::logger::init_logger_from_env();

    let peripherals = esp_hal::init(esp_hal::Config::default());

    // WiFi driver needs a heap; ESP32 is tighter on DRAM.
    #[cfg(feature = "esp32")]
    {
        esp_alloc::heap_allocator!(size: 64 * 1024);
    }
    #[cfg(not(feature = "esp32"))]
    {
        esp_alloc::heap_allocator!(size: 96 * 1024);
    }

    // Start the RTOS: needs a timer and a software interrupt
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    let sw_int = SoftwareInterruptControl::new(peripherals.SW_INTERRUPT);
    esp_rtos::start(timg0.timer0, sw_int.software_interrupt0);

    let id = node_id();
    let config = node_config();
    log::info!(
        "proxlink v{} starting on {} as {} (id {})",
        VERSION,
        board::BOARD_NAME,
        config.role.as_str(),
        id
    );

    // ── Light sensor ─────────────────────────────────────────────────

    let mut adc_config = AdcConfig::new();
    #[cfg(feature = "board-m5stickc")]
    let light = adc_config.enable_pin(peripherals.GPIO36, Attenuation::_11dB);
    #[cfg(not(feature = "board-m5stickc"))]
    let light = adc_config.enable_pin(peripherals.GPIO1, Attenuation::_11dB);
    let adc = Adc::new(peripherals.ADC1, adc_config);
    log::info!("Light sensor on GPIO{}", board::LIGHT_SENSOR_PIN);

    // ── ESP-NOW radio ────────────────────────────────────────────────

    let (wifi_controller, wifi_interfaces) =
        match esp_radio::wifi::new(peripherals.WIFI, Default::default()) {
            Ok(radio) => radio,
            Err(e) => {
                log::error!("WiFi init failed: {:?}", e);
                return;
            }
        };

    // The controller must outlive the ESP-NOW tasks
    static WIFI_CONTROLLER: StaticCell<WifiController<'static>> = StaticCell::new();
    let wifi_controller = WIFI_CONTROLLER.init(wifi_controller);
    if let Err(e) = wifi_controller.start() {
        log::error!("WiFi start failed: {:?}", e);
        return;
    }

    let esp_now = wifi_interfaces.esp_now;
    if let Err(e) = esp_now.set_channel(board::RADIO_CHANNEL) {
        log::error!("ESP-NOW channel {} rejected: {:?}", board::RADIO_CHANNEL, e);
        return;
    }
    let (_manager, sender, receiver) = esp_now.split();

    log::info!("ESP-NOW up on channel {}", board::RADIO_CHANNEL);

    spawner.must_spawn(rx_task(receiver));
    spawner.must_spawn(tx_task(sender));
    spawner.must_spawn(output_serial_task());

    let mut node = Node::new(id, config, Board { adc, light });
    node.run().await;
}

/// Receive task: forwards frames heard while the radio is on.
#[embassy_executor::task]
async fn rx_task(mut receiver: EspNowReceiver<'static>) {
    loop {
        let received = receiver.receive_async().await;
        if !RADIO_ON.load(Ordering::Relaxed) {
            continue;
        }
        let frame = RxFrame::new(received.data(), received.info.rx_control.rssi as i16);
        if RX_CHANNEL.try_send(frame).is_err() {
            log::debug!("RX queue full, frame dropped");
        }
    }
}

/// Transmit task: best-effort broadcast, no retries.
#[embassy_executor::task]
async fn tx_task(mut sender: EspNowSender<'static>) {
    let tx_rx = TX_CHANNEL.receiver();
    loop {
        let frame = tx_rx.receive().await;
        if let Err(e) = sender.send_async(&BROADCAST_ADDRESS, &frame).await {
            log::debug!("Broadcast failed: {:?}", e);
        }
    }
}

/// Serial output task: writes each NDJSON report as one log line.
#[embassy_executor::task]
async fn output_serial_task() {
    log::info!("Serial output task started");

    let output_rx = OUTPUT_CHANNEL.receiver();

    loop {
        let msg = output_rx.receive().await;
        if let Ok(s) = core::str::from_utf8(&msg) {
            log::info!("{}", s.trim_end());
        }
    }
}
