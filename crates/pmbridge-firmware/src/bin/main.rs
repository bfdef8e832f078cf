#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use embassy_executor::Spawner;
use embassy_net::tcp::TcpSocket;
use embassy_net::{StackResources, new as new_stack};
use esp_hal::clock::CpuClock;
use esp_hal::rng::Rng;
use esp_hal::timer::timg::TimerGroup;
use log::{info, warn};
use pmbridge_core::bridge::{Bridge, BridgeIo};
use pmbridge_core::config::BridgeSettings;
use pmbridge_firmware::clock::SystemClock;
use pmbridge_firmware::mqtt::MqttLink;
use pmbridge_firmware::ota::{OtaMonitor, ota_task};
use pmbridge_firmware::sensors::BoardClimate;
use pmbridge_firmware::{config, hardware, wifi};
use rtt_target::rprintln;
use static_cell::StaticCell;

const SOCKET_BUFFER_SIZE: usize = 1024;

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!(log::LevelFilter::Info);

    let hal_config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(hal_config);

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    rprintln!("Embassy initialized!");

    let config = config::load();
    let settings = BridgeSettings::from_config(&config).expect("Invalid bridge configuration");
    info!(
        "Publishing as {} every {} s",
        settings.client_id,
        settings.publish_interval.as_secs()
    );

    // Network: radio, IP stack, WiFi upkeep
    static RADIO: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();
    let radio = RADIO.init(esp_radio::init().expect("Failed to initialize Wi-Fi/BLE controller"));
    let (wifi_controller, interfaces) =
        esp_radio::wifi::new(radio, peripherals.WIFI, Default::default())
            .expect("Failed to initialize Wi-Fi controller");

    let rng = Rng::new();
    let seed = u64::from(rng.random()) << 32 | u64::from(rng.random());
    static RESOURCES: StaticCell<StackResources<4>> = StaticCell::new();
    let (stack, runner) = new_stack(
        interfaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        RESOURCES.init(StackResources::new()),
        seed,
    );

    spawner.spawn(wifi::net_task(runner)).ok();
    if config.internet.ssid.is_empty() {
        warn!("WIFI_SSID not set, running without network");
    } else {
        spawner
            .spawn(wifi::connection_task(
                wifi_controller,
                config.internet.ssid,
                config.internet.password,
            ))
            .ok();
    }
    spawner.spawn(ota_task(stack, peripherals.FLASH)).ok();

    // Sensor link
    let serial = hardware::create_sensor_uart(peripherals.UART1, peripherals.GPIO18, peripherals.GPIO17)
        .expect("Failed to configure sensor UART");

    #[cfg(feature = "sensor-sht40")]
    let climate: BoardClimate = {
        let i2c = hardware::create_i2c_bus(peripherals.I2C0, peripherals.GPIO12, peripherals.GPIO11)
            .expect("Failed to configure I2C bus");
        pmbridge_firmware::sensors::SHT40Sensor::new(i2c)
    };
    #[cfg(not(feature = "sensor-sht40"))]
    let climate: BoardClimate = pmbridge_core::sensors::NoClimateSensor;

    // Broker session
    static RX_BUFFER: StaticCell<[u8; SOCKET_BUFFER_SIZE]> = StaticCell::new();
    static TX_BUFFER: StaticCell<[u8; SOCKET_BUFFER_SIZE]> = StaticCell::new();
    let socket = TcpSocket::new(
        stack,
        RX_BUFFER.init([0; SOCKET_BUFFER_SIZE]),
        TX_BUFFER.init([0; SOCKET_BUFFER_SIZE]),
    );
    let broker = MqttLink::new(stack, socket, config.broker.host, config.broker.port);

    let mut bridge = Bridge::new(
        &settings,
        BridgeIo {
            serial,
            broker,
            climate,
            update: OtaMonitor,
            delay: embassy_time::Delay,
            clock: SystemClock,
        },
    );
    bridge.run().await;

    info!("Restarting into new firmware");
    esp_hal::system::software_reset()
}
