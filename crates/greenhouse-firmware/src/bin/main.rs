#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use core::cell::RefCell;

use embassy_executor::Spawner;
use embassy_net::StackResources;
use embassy_sync::blocking_mutex::Mutex;
use esp_hal::analog::adc::{Adc, AdcConfig, Attenuation};
use esp_hal::clock::CpuClock;
use esp_hal::delay::Delay;
use esp_hal::rng::Rng;
use esp_hal::timer::timg::TimerGroup;
use log::{info, warn};
use static_cell::StaticCell;

use greenhouse_core::broker::LogOnlyConnector;
use greenhouse_core::node::SensorNode;
use greenhouse_core::sensors::{Dht11, GasSensor, SoilSensor};
use greenhouse_firmware::config;
use greenhouse_firmware::dht_pin::DhtPin;
use greenhouse_firmware::mqtt_link::MqttConnector;
use greenhouse_firmware::shared_adc::{SharedAdc1, SharedAdcPin};
use greenhouse_firmware::wifi;

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

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 98768);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("Embassy initialized!");

    let node_config = config::node_config();

    // Both analog sensors share ADC1, 12-bit with 11 dB attenuation for the
    // full 0-3.3 V range.
    let mut adc1_config = AdcConfig::new();
    let gas_pin = adc1_config.enable_pin(peripherals.GPIO33, Attenuation::_11dB);
    let soil_pin = adc1_config.enable_pin(peripherals.GPIO32, Attenuation::_11dB);

    static ADC1: StaticCell<SharedAdc1> = StaticCell::new();
    let adc1 = ADC1.init(Mutex::new(RefCell::new(Adc::new(
        peripherals.ADC1,
        adc1_config,
    ))));

    let gas = GasSensor::gas(SharedAdcPin::new(adc1, gas_pin, "MQ135"));
    let soil = SoilSensor::soil(SharedAdcPin::new(adc1, soil_pin, "HW-390"));
    let humidity = Dht11::new(DhtPin::new(peripherals.GPIO14), Delay::new());

    let mut node = SensorNode::new(node_config, gas, humidity, soil, embassy_time::Delay);

    info!("Sensors ready: MQ135 on GPIO33, DHT11 on GPIO14, HW-390 on GPIO32");

    if node_config.broker.host.is_empty() {
        warn!("MQTT_HOST not set at build time, readings are only logged");
        let mut connector = LogOnlyConnector::new();
        node.run(&mut connector).await
    }

    // Wi-Fi station
    static RADIO: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();
    let radio = RADIO.init(esp_radio::init().expect("Failed to initialize Wi-Fi/BLE controller"));
    let (wifi_controller, interfaces) =
        esp_radio::wifi::new(radio, peripherals.WIFI, Default::default())
            .expect("Failed to initialize Wi-Fi controller");

    let rng = Rng::new();
    let seed = ((rng.random() as u64) << 32) | rng.random() as u64;

    static RESOURCES: StaticCell<StackResources<3>> = StaticCell::new();
    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        RESOURCES.init(StackResources::new()),
        seed,
    );

    spawner
        .spawn(wifi::connection_task(
            wifi_controller,
            node_config.wifi.ssid,
            node_config.wifi.password,
        ))
        .expect("Failed to spawn Wi-Fi connection task");
    spawner
        .spawn(wifi::net_task(runner))
        .expect("Failed to spawn network task");

    wifi::wait_for_network(stack).await;

    info!(
        "ESP32 MQTT publisher ready, publishing to {} every {} ms",
        node_config.broker.topic, node_config.sample_interval_ms
    );

    static CONNECTOR: StaticCell<MqttConnector<'static>> = StaticCell::new();
    let connector = CONNECTOR.init(MqttConnector::new(stack, node_config.broker));

    node.run(connector).await
}
