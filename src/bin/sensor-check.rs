//! ==============================================================================
//! sensor-check - manual broker check
//! ==============================================================================
//!
//! connects to the configured broker, listens on both topics, publishes one
//! sample reading plus an ON and an OFF pump command, prints whatever comes
//! back and exits after ten seconds.
//!
//!     cargo run --bin sensor-check
//!
//! ==============================================================================

use anyhow::Result;
use rumqttc::{AsyncClient, Event, Packet, QoS};
use serde_json::json;
use std::time::Duration;

use sensor_bridge::config::{BridgeConfig, MqttConfig};
use sensor_bridge::mqtt;

const RUN_FOR: Duration = Duration::from_secs(10);
const COMMAND_GAP: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    let config = BridgeConfig::load_or_default();
    let mqtt_config = MqttConfig {
        client_id: "sensor-check".to_string(),
        ..config.mqtt.clone()
    };
    let telemetry_topic = mqtt_config.telemetry_topic.clone();
    let command_topic = mqtt_config.command_topic.clone();

    println!("[CHECK] Broker: {}:{}", mqtt_config.host, mqtt_config.port);
    let (client, mut eventloop) = AsyncClient::new(mqtt::options(&mqtt_config), 16);

    // queued until the event loop connects
    client.subscribe(telemetry_topic.as_str(), QoS::AtMostOnce).await?;
    client.subscribe(command_topic.as_str(), QoS::AtMostOnce).await?;

    let sample = json!({ "suhu": 25.5, "kelembapan": 60.0, "cahaya": 75.0 });
    client
        .publish(telemetry_topic.as_str(), QoS::AtMostOnce, false, sample.to_string())
        .await?;
    println!("[CHECK] Sent to {telemetry_topic}: {sample}");

    let commander = client.clone();
    tokio::spawn(async move {
        for command in ["ON", "OFF"] {
            tokio::time::sleep(COMMAND_GAP).await;
            match commander
                .publish(command_topic.as_str(), QoS::AtMostOnce, false, command)
                .await
            {
                Ok(()) => println!("[CHECK] Sent to {command_topic}: {command}"),
                Err(e) => println!("[CHECK] ⚠ Publish failed: {e}"),
            }
        }
    });

    let deadline = tokio::time::sleep(RUN_FOR);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            event = eventloop.poll() => match event? {
                Event::Incoming(Packet::ConnAck(_)) => println!("[CHECK] ✓ Connected"),
                Event::Incoming(Packet::SubAck(_)) => println!("[CHECK] ✓ Subscribed"),
                Event::Incoming(Packet::Publish(p)) => {
                    println!("[CHECK] Received on {}: {}", p.topic, String::from_utf8_lossy(&p.payload));
                }
                _ => {}
            },
        }
    }

    client.disconnect().await?;
    println!("[CHECK] ✓ Done");
    Ok(())
}
