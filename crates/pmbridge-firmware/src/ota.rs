//! Network firmware updates
//!
//! A raw TCP listener on [`OTA_PORT`] accepts one image per connection and
//! streams it into the inactive OTA slot. Progress is reported to the bridge
//! loop through [`UPDATE_EVENTS`]; the bridge pauses publishing once an
//! image starts arriving and restarts after it has been activated.

use embassy_net::Stack;
use embassy_net::tcp::TcpSocket;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::Duration;
use embedded_storage::Storage;
use esp_bootloader_esp_idf::ota::OtaImageState;
use esp_bootloader_esp_idf::ota_updater::OtaUpdater;
use esp_bootloader_esp_idf::partitions::PARTITION_TABLE_MAX_LEN;
use esp_storage::FlashStorage;
use log::{info, warn};
use pmbridge_core::app_state::FromTruncated;
use pmbridge_core::update::{UpdateEvent, UpdateHook};
use thiserror_no_std::Error;

pub const OTA_PORT: u16 = 3232;

const CHUNK_SIZE: usize = 1024;
const IDLE_TIMEOUT: Duration = Duration::from_secs(15);

/// Update progress, written by [`ota_task`] and drained by [`OtaMonitor`].
pub static UPDATE_EVENTS: Channel<CriticalSectionRawMutex, UpdateEvent, 2> = Channel::new();

/// Update hook handed to the bridge loop.
#[derive(Debug, Default)]
pub struct OtaMonitor;

impl UpdateHook for OtaMonitor {
    fn poll(&mut self) -> Option<UpdateEvent> {
        UPDATE_EVENTS.try_receive().ok()
    }
}

#[derive(Error, Debug)]
pub enum OtaError {
    #[error("connection error: {0:?}")]
    Connection(embassy_net::tcp::Error),
    #[error("flash error: {0}")]
    Flash(heapless::String<64>),
    #[error("empty image")]
    Empty,
}

fn flash_error<E: core::fmt::Debug>(e: E) -> OtaError {
    OtaError::Flash(heapless::String::from_truncated(format_args!("{:?}", e)))
}

#[embassy_executor::task]
pub async fn ota_task(stack: Stack<'static>, flash: esp_hal::peripherals::FLASH<'static>) {
    let mut flash = FlashStorage::new(flash);
    let mut rx_buffer = [0_u8; 2048];
    let mut tx_buffer = [0_u8; 128];

    stack.wait_config_up().await;
    info!("Update listener on port {}", OTA_PORT);

    loop {
        let mut socket = TcpSocket::new(stack, &mut rx_buffer, &mut tx_buffer);
        socket.set_timeout(Some(IDLE_TIMEOUT));

        if let Err(e) = socket.accept(OTA_PORT).await {
            warn!("Update accept failed: {:?}", e);
            continue;
        }

        match receive_image(&mut socket, &mut flash).await {
            Ok(size) => {
                info!("Update image of {} bytes activated", size);
                socket.close();
                let _ = socket.flush().await;
                UPDATE_EVENTS.send(UpdateEvent::Finished).await;
            }
            Err(OtaError::Empty) => info!("Update connection closed without data"),
            Err(e) => {
                warn!("Update failed: {}", e);
                socket.abort();
            }
        }
    }
}

/// Stream the connection into the next OTA slot and mark it bootable.
async fn receive_image(
    socket: &mut TcpSocket<'_>,
    flash: &mut FlashStorage<'_>,
) -> Result<u32, OtaError> {
    let mut table = [0_u8; PARTITION_TABLE_MAX_LEN];
    let mut updater = OtaUpdater::new(flash, &mut table).map_err(flash_error)?;
    let (mut target, _) = updater.next_partition().map_err(flash_error)?;

    let mut chunk = [0_u8; CHUNK_SIZE];
    let mut written = 0_u32;

    loop {
        let n = socket.read(&mut chunk).await.map_err(OtaError::Connection)?;
        if n == 0 {
            break;
        }
        if written == 0 {
            info!("Receiving update image");
            UPDATE_EVENTS.send(UpdateEvent::Started).await;
        }
        target.write(written, &chunk[..n]).map_err(flash_error)?;
        written += n as u32;
    }

    if written == 0 {
        return Err(OtaError::Empty);
    }

    updater.activate_next_partition().map_err(flash_error)?;
    updater
        .set_current_ota_state(OtaImageState::New)
        .map_err(flash_error)?;
    Ok(written)
}
