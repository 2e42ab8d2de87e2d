use clap::{App, Arg, ArgMatches, SubCommand};
use orbit::{
    monotonic_timestamp, Channel, ControlOp, OpenOptions, Orb, OrbConfig, OrbError, RawState,
    Result, Role, ShmTransport, TopicMetadata, TopicState, Transport,
};
use std::{thread, time::Duration};

fn main() -> Result<()> {
    env_logger::init();

    let topic_args = || {
        vec![
            Arg::with_name("topic")
                .short("t")
                .long("topic")
                .value_name("NAME")
                .help("Topic name")
                .required(true)
                .takes_value(true),
            Arg::with_name("instance")
                .short("i")
                .long("instance")
                .value_name("INSTANCE")
                .help("Instance number")
                .default_value("0")
                .takes_value(true),
            Arg::with_name("size")
                .short("s")
                .long("size")
                .value_name("BYTES")
                .help("Element size (read from the channel identity when omitted)")
                .takes_value(true),
        ]
    };

    let matches = App::new("orbit-cli")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Orbit topic broker CLI Tool")
        .arg(
            Arg::with_name("root")
                .short("r")
                .long("root")
                .value_name("DIR")
                .help("Root directory of the shared-memory transport")
                .default_value("/tmp/orbit")
                .takes_value(true)
                .global(true),
        )
        .arg(
            Arg::with_name("base")
                .long("base")
                .value_name("PATH")
                .help("Channel base path")
                .default_value(orbit::config::DEFAULT_BASE_PATH)
                .takes_value(true)
                .global(true),
        )
        .subcommand(SubCommand::with_name("list").about("List channels and their state"))
        .subcommand(
            SubCommand::with_name("state")
                .about("Show the state of one topic instance")
                .args(&topic_args()),
        )
        .subcommand(
            SubCommand::with_name("exists")
                .about("Check whether a topic instance has an advertiser")
                .args(&topic_args()),
        )
        .subcommand(
            SubCommand::with_name("count")
                .about("Count contiguous advertised instances of a topic")
                .args(&topic_args()),
        )
        .subcommand(
            SubCommand::with_name("advertise")
                .about("Advertise a topic and publish hex-encoded samples")
                .args(&topic_args())
                .arg(
                    Arg::with_name("data")
                        .short("d")
                        .long("data")
                        .value_name("HEX")
                        .help("Sample payload as hex")
                        .required(true)
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("queue")
                        .short("q")
                        .long("queue")
                        .value_name("DEPTH")
                        .help("Buffer depth")
                        .default_value("0")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("count")
                        .short("c")
                        .long("count")
                        .value_name("COUNT")
                        .help("Number of samples to publish")
                        .default_value("1")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("period")
                        .short("p")
                        .long("period-ms")
                        .value_name("MILLIS")
                        .help("Delay between samples")
                        .default_value("100")
                        .takes_value(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("listen")
                .about("Subscribe and print samples as hex")
                .args(&topic_args())
                .arg(
                    Arg::with_name("count")
                        .short("c")
                        .long("count")
                        .value_name("COUNT")
                        .help("Number of samples to print")
                        .default_value("1")
                        .takes_value(true),
                ),
        )
        .subcommand(SubCommand::with_name("info").about("Show build information"))
        .get_matches();

    let transport = ShmTransport::new(matches.value_of("root").unwrap())
        .map_err(|e| OrbError::from_io(e, "Failed to open transport root"))?;
    let config = OrbConfig::default().with_base_path(matches.value_of("base").unwrap());
    let orb = Orb::with_config(transport, config)?;

    match matches.subcommand() {
        ("list", Some(_)) => handle_list(&orb)?,
        ("state", Some(sub)) => handle_state(&orb, sub)?,
        ("exists", Some(sub)) => {
            let (meta, instance) = topic_from_args(&orb, sub)?;
            let present = orb.exists(&meta, instance)?;
            println!("{}{}: {}", meta.name(), instance, if present { "advertised" } else { "absent" });
        }
        ("count", Some(sub)) => {
            let (meta, _) = topic_from_args(&orb, sub)?;
            println!("{}: {} instance(s)", meta.name(), orb.group_count(&meta)?);
        }
        ("advertise", Some(sub)) => handle_advertise(&orb, sub)?,
        ("listen", Some(sub)) => handle_listen(&orb, sub)?,
        ("info", Some(_)) => show_info(),
        _ => println!("Use --help for usage information"),
    }

    Ok(())
}

fn parse_number<N: std::str::FromStr>(matches: &ArgMatches, name: &str) -> Result<N> {
    matches
        .value_of(name)
        .unwrap_or_default()
        .parse()
        .map_err(|_| OrbError::invalid_parameter(name, "Invalid number format"))
}

/// Build metadata from arguments, falling back to the identity stored in the channel
fn topic_from_args(orb: &Orb<ShmTransport>, matches: &ArgMatches) -> Result<(TopicMetadata, u32)> {
    let name = matches.value_of("topic").unwrap();
    let instance: u32 = parse_number(matches, "instance")?;

    if matches.is_present("size") {
        let size: usize = parse_number(matches, "size")?;
        return Ok((TopicMetadata::owned(name, size), instance));
    }

    // Any size passes path validation; only the name matters here
    let path = orb.channel_path(&TopicMetadata::owned(name, 1), instance)?;
    let identity = orb
        .transport()
        .identity(path.as_str())
        .map_err(|e| OrbError::from_io(e, &format!("read identity of {}", path)))?;

    match identity {
        Some(meta) => Ok((meta, instance)),
        None => Err(OrbError::invalid_parameter(
            "size",
            format!("{} carries no identity; pass --size", path),
        )),
    }
}

fn handle_list(orb: &Orb<ShmTransport>) -> Result<()> {
    let transport = orb.transport();
    let paths = transport
        .list(&orb.config().base_path)
        .map_err(|e| OrbError::from_io(e, "Failed to list channels"))?;

    if paths.is_empty() {
        println!("No channels found");
        return Ok(());
    }

    println!("{:<40} {:>6} {:>5} {:>5} {:>10}", "CHANNEL", "SIZE", "ADV", "SUB", "GENERATION");
    for path in paths {
        let identity = transport.identity(&path).ok().flatten();
        let size = identity
            .as_ref()
            .map(|meta| meta.size().to_string())
            .unwrap_or_else(|| "?".to_string());

        let state = read_raw_state(transport, &path)?;

        println!(
            "{:<40} {:>6} {:>5} {:>5} {:>10}",
            path, size, state.nadvertisers, state.nsubscribers, state.generation
        );
    }

    Ok(())
}

fn handle_state(orb: &Orb<ShmTransport>, matches: &ArgMatches) -> Result<()> {
    let (meta, instance) = topic_from_args(orb, matches)?;
    let path = orb.channel_path(&meta, instance)?;
    if !orb.transport().exists(path.as_str()) {
        return Err(OrbError::not_found(path.to_string()));
    }

    // Counted as neither advertiser nor subscriber
    let raw = read_raw_state(orb.transport(), path.as_str())?;
    let interval = raw.min_interval;
    let state = TopicState::from(raw);

    println!("Channel: {}", path);
    println!("  element size:       {} bytes", meta.size());
    println!("  max frequency:      {} Hz", state.max_frequency);
    println!("  min interval:       {} us", interval);
    println!("  min batch interval: {} us", state.min_batch_interval);
    println!("  queue size:         {}", state.queue_size);
    println!("  subscribers:        {}", state.nsubscribers);
    println!("  generation:         {}", state.generation);

    Ok(())
}

fn read_raw_state(transport: &ShmTransport, path: &str) -> Result<RawState> {
    let mut probe = transport
        .open(path, &OpenOptions::probe())
        .map_err(|e| OrbError::from_io(e, &format!("probe {}", path)))?;
    probe
        .control(ControlOp::GetRawState)
        .and_then(|reply| reply.into_state())
        .map_err(|e| OrbError::from_io(e, &format!("probe {}", path)))
}

fn handle_advertise(orb: &Orb<ShmTransport>, matches: &ArgMatches) -> Result<()> {
    let (meta, instance) = topic_from_args(orb, matches)?;
    let queue: u32 = parse_number(matches, "queue")?;
    let count: u64 = parse_number(matches, "count")?;
    let period: u64 = parse_number(matches, "period")?;

    let data = hex::decode(matches.value_of("data").unwrap())
        .map_err(|e| OrbError::invalid_parameter("data", format!("Invalid hex: {}", e)))?;

    let mut handle = orb.advertise_multi_queue(&meta, Some(data.as_slice()), Some(instance), queue)?;
    println!("Advertising {} ({} bytes)", handle.path(), meta.size());

    for _ in 1..count {
        thread::sleep(Duration::from_millis(period));
        handle.publish_sample(&data)?;
    }

    println!("Published {} sample(s)", count.max(1));
    orb.unadvertise(handle)
}

fn handle_listen(orb: &Orb<ShmTransport>, matches: &ArgMatches) -> Result<()> {
    let (meta, instance) = topic_from_args(orb, matches)?;
    let count: u64 = parse_number(matches, "count")?;

    let mut handle = orb.subscribe_multi(&meta, instance)?;
    let mut buf = vec![0u8; meta.size()];

    for _ in 0..count {
        handle.copy_sample(&mut buf)?;
        println!("[{}] {}: {}", monotonic_timestamp(), handle.path(), hex::encode(&buf));
    }

    orb.unsubscribe(handle)
}

fn show_info() {
    println!("Orbit Topic Broker");
    println!("Version: {}", orbit::VERSION);

    println!("\nTransports:");
    println!("  - In-process channels (MemoryTransport)");
    println!("  - File-backed shared memory (ShmTransport)");

    println!("\nRoles:");
    println!("  - {}", Role::Advertiser.name());
    println!("  - {}", Role::Subscriber.name());
}
