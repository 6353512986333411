// SPDX-License-Identifier: Apache-2.0

use clap::Parser;
use std::error::Error;
use std::fs;
use tam_engine::teep::message::DEFAULT_MAX_MESSAGE_SIZE;
use tam_engine::otrp;
use tam_engine::teep::{QueryRequest, TeepMessage};

#[derive(Parser)]
enum TamEngineCli {
    Query(QueryArgs),
    Otrp(OtrpArgs),
    Decode(DecodeArgs),
}

#[derive(Debug, clap::Args)]
#[command(author, version, long_about = None,
    about = "Compose a TEEP QueryRequest and write the CBOR encoding to a \
    file")]
struct QueryArgs {
    #[arg(short, long, default_value = "query-request.cbor")]
    out: String,
}

#[derive(Debug, clap::Args)]
#[command(author, version, long_about = None,
    about = "Compose an OTrP GetDeviceStateRequest signed with the TAM key \
    and write the JSON encoding to a file")]
struct OtrpArgs {
    #[arg(short, long, default_value = "get-device-state-request.json")]
    out: String,
}

#[derive(Debug, clap::Args)]
#[command(author, version, long_about = None,
    about = "Decode a CBOR-encoded TEEP message and dump its contents")]
struct DecodeArgs {
    #[arg(short, long, default_value = "message.cbor")]
    message: String,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match TamEngineCli::parse() {
        TamEngineCli::Query(args) => match query(&args) {
            Ok(_) => println!("QueryRequest written to {}", args.out),
            Err(e) => eprintln!("QueryRequest composition failed: {e}"),
        },

        TamEngineCli::Otrp(args) => match otrp_request(&args) {
            Ok(_) => println!("GetDeviceStateRequest written to {}", args.out),
            Err(e) => eprintln!("GetDeviceStateRequest composition failed: {e}"),
        },

        TamEngineCli::Decode(args) => match decode(&args) {
            Ok(_) => println!("decode successful"),
            Err(e) => eprintln!("decode failed: {e}"),
        },
    }
}

fn query(args: &QueryArgs) -> Result<(), Box<dyn Error>> {
    let qr = QueryRequest::compose()?;
    let encoded = qr.encode(DEFAULT_MAX_MESSAGE_SIZE)?;

    fs::write(&args.out, encoded)?;

    Ok(())
}

fn otrp_request(args: &OtrpArgs) -> Result<(), Box<dyn Error>> {
    let encoded = otrp::compose_get_device_state_request()?;

    fs::write(&args.out, encoded)?;

    Ok(())
}

fn decode(args: &DecodeArgs) -> Result<(), Box<dyn Error>> {
    let c: Vec<u8> = fs::read(&args.message)?;

    let msg = TeepMessage::decode(&c)?;

    match &msg {
        TeepMessage::QueryRequest(qr) => {
            println!("QueryRequest");
            println!("  token: {}", hex::encode(&qr.token));
            println!("  trusted-components requested: {}", qr.trusted_components);
        }
        TeepMessage::QueryResponse(qr) => {
            println!("QueryResponse");
            println!("  token: {}", hex::encode(&qr.token));
            if let Some(v) = qr.selected_version {
                println!("  selected-version: {v}");
            }
            if let Some(cs) = qr.selected_cipher_suite {
                println!("  selected-cipher-suite: {cs}");
            }
            for rci in &qr.requested_components {
                println!("  component: {}", hex::encode(&rci.component_id));
            }
        }
        TeepMessage::Install(install) => {
            println!("Install");
            for m in &install.manifests {
                println!("  manifest: {}", hex::encode(m));
            }
        }
    }

    Ok(())
}
