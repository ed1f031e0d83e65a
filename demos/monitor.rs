use meross_lan::{
    Descriptor, Device, HttpTransport, Method, MessageLogMode, Namespace, Transport, get_payload,
};
use std::env;
use std::time::Duration;

const POLLED: &[Namespace] = &[
    Namespace::ToggleX,
    Namespace::Toggle,
    Namespace::ThermostatMode,
    Namespace::DiffuserLight,
    Namespace::DiffuserSpray,
    Namespace::DiffuserSensor,
    Namespace::SensorLatest,
    Namespace::SensorLatestX,
    Namespace::Mp3,
];

#[tokio::main]
async fn main() -> meross_lan::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let host = args.get(1).expect("usage: monitor <host> [key] [--log <path>]");
    let key = args.get(2).filter(|a| !a.starts_with("--")).cloned().unwrap_or_default();
    let log_path = args
        .iter()
        .position(|a| a == "--log")
        .and_then(|i| args.get(i + 1));

    let mut builder = HttpTransport::builder(host).key(key);
    if let Some(path) = log_path {
        builder = builder.message_log(MessageLogMode::Diffed, path);
    }
    let transport = builder.build()?;

    println!("Querying {host}...");
    let all = transport
        .request(Namespace::SystemAll, Method::Get, get_payload(Namespace::SystemAll))
        .await?;
    let ability = transport
        .request(Namespace::SystemAbility, Method::Get, get_payload(Namespace::SystemAbility))
        .await?;
    let descriptor = Descriptor::from_payloads(&all.payload, &ability.payload)?;

    let mut device = Device::builder(descriptor)
        .on_flush(|entity| {
            if entity.available() {
                println!("{entity:?}");
            } else {
                println!("[{}] unavailable", entity.id());
            }
        })
        .build();
    println!("Device {} with {} entities", device.uuid(), device.entities().count());

    loop {
        for namespace in POLLED {
            if !device.dispatcher().supports(*namespace) {
                continue;
            }
            if let Err(e) = device.poll(&transport, *namespace).await {
                eprintln!("Poll {namespace} failed: {e}");
            }
        }
        tokio::time::sleep(Duration::from_secs(30)).await;
    }
}
