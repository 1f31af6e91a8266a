//! Wi-Fi station bring-up and network tasks

use embassy_net::{Runner, Stack};
use embassy_time::{Duration, Timer};
use esp_radio::wifi::{
    ClientConfig, ModeConfig, WifiController, WifiDevice, WifiEvent, WifiStaState,
};
use log::{info, warn};

/// Wait between two failed association attempts.
const RETRY_DELAY: Duration = Duration::from_millis(5000);

/// Keeps the station associated: connects, waits for a disconnect, reconnects.
#[embassy_executor::task]
pub async fn connection_task(
    mut controller: WifiController<'static>,
    ssid: &'static str,
    password: &'static str,
) {
    info!("Connecting to {}", ssid);

    loop {
        if matches!(esp_radio::wifi::sta_state(), WifiStaState::Connected) {
            controller.wait_for_event(WifiEvent::StaDisconnected).await;
            warn!("WiFi disconnected");
            Timer::after(RETRY_DELAY).await;
        }

        if !matches!(controller.is_started(), Ok(true)) {
            let config = ModeConfig::Client(
                ClientConfig::default()
                    .with_ssid(ssid.into())
                    .with_password(password.into()),
            );
            if let Err(e) = controller.set_config(&config) {
                warn!("WiFi configuration rejected: {:?}", e);
                Timer::after(RETRY_DELAY).await;
                continue;
            }
            if let Err(e) = controller.start_async().await {
                warn!("WiFi start failed: {:?}", e);
                Timer::after(RETRY_DELAY).await;
                continue;
            }
            info!("WiFi started");
        }

        match controller.connect_async().await {
            Ok(()) => info!("WiFi connected"),
            Err(e) => {
                warn!("WiFi connect failed: {:?}", e);
                Timer::after(RETRY_DELAY).await;
            }
        }
    }
}

/// Drives the embassy-net stack.
#[embassy_executor::task]
pub async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}

/// Wait for the link to come up and DHCP to hand out an address.
pub async fn wait_for_network(stack: Stack<'_>) {
    stack.wait_link_up().await;
    stack.wait_config_up().await;

    if let Some(config) = stack.config_v4() {
        info!("WiFi connected, IP address: {}", config.address);
    }
}
