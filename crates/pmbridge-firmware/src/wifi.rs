//! WiFi station upkeep and the embassy-net runner

use embassy_net::Runner;
use embassy_time::{Duration, Timer};
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiController, WifiDevice};
use log::{error, info, warn};

const RECONNECT_CHECK: Duration = Duration::from_secs(5);
const CONNECT_POLL: Duration = Duration::from_millis(100);
const CONNECT_ATTEMPT_POLLS: usize = 100;

/// Join the configured network and rejoin whenever the link drops.
#[embassy_executor::task]
pub async fn connection_task(
    mut controller: WifiController<'static>,
    ssid: &'static str,
    password: &'static str,
) {
    let client = ClientConfig::default()
        .with_ssid(ssid.into())
        .with_password(password.into());

    if let Err(e) = controller.set_config(&ModeConfig::Client(client)) {
        error!("WiFi set_config failed: {:?}", e);
        return;
    }
    if let Err(e) = controller.start() {
        error!("WiFi start failed: {:?}", e);
        return;
    }
    info!("WiFi started, joining {}", ssid);

    loop {
        if !controller.is_connected().unwrap_or(false) {
            if let Err(e) = controller.connect() {
                warn!("WiFi connect failed: {:?}", e);
                Timer::after(RECONNECT_CHECK).await;
                continue;
            }
            for _ in 0..CONNECT_ATTEMPT_POLLS {
                if controller.is_connected().unwrap_or(false) {
                    info!("WiFi connected");
                    break;
                }
                Timer::after(CONNECT_POLL).await;
            }
        }
        Timer::after(RECONNECT_CHECK).await;
    }
}

#[embassy_executor::task]
pub async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) -> ! {
    runner.run().await
}
