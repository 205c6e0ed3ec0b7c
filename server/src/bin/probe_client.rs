//! Headless client that joins a room, grabs the nearest group it sees and
//! throws it, printing everything the server sends back.

use arena_shared::{decode_packet, encode_packet, Animal, NpcGroupId, Packet, Vector2};
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server address
    #[clap(short, long, default_value = "127.0.0.1:8080")]
    server: SocketAddr,
    /// Room to join, matchmade when omitted
    #[clap(short, long)]
    room: Option<String>,
    #[clap(short, long, default_value = "probe")]
    nickname: String,
    /// Seconds to keep listening
    #[clap(short, long, default_value = "10")]
    duration: u64,
}

async fn send(socket: &UdpSocket, server: SocketAddr, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
    socket.send_to(&encode_packet(packet)?, server).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    println!("Client socket bound to {}", socket.local_addr()?);

    send(
        &socket,
        args.server,
        &Packet::Join {
            room_hint: args.room.clone(),
            animal: Animal::Wolf,
            nickname: args.nickname.clone(),
        },
    )
    .await?;

    let mut buf = [0u8; 8192];
    let mut position = Vector2::ZERO;
    let mut target: Option<(NpcGroupId, Vector2)> = None;
    let mut holding = false;

    for _ in 0..args.duration * 4 {
        while let Ok(Ok((len, _))) = timeout(Duration::from_millis(50), socket.recv_from(&mut buf)).await {
            let packet = match decode_packet(&buf[..len]) {
                Ok(packet) => packet,
                Err(e) => {
                    println!("Failed to decode packet: {}", e);
                    continue;
                }
            };

            match &packet {
                Packet::Joined { user_id, room, terrain } => {
                    println!("Joined {} as user {} ({:?})", room, user_id, terrain.boundaries);
                }
                Packet::RoomSnapshot { users, npc_groups, paths } => {
                    println!(
                        "Snapshot: {} users, {} groups, {} paths",
                        users.len(),
                        npc_groups.len(),
                        paths.len()
                    );
                    target = npc_groups
                        .values()
                        .filter(|g| g.is_free_idle())
                        .map(|g| (g.id, g.position))
                        .min_by(|a, b| a.1.distance(&position).total_cmp(&b.1.distance(&position)));
                }
                Packet::Rejected { reason } => {
                    println!("Rejected: {}", reason);
                    return Ok(());
                }
                other => println!("Received {}", other.name()),
            }
        }

        if let Some((id, at)) = target {
            if holding {
                send(
                    &socket,
                    args.server,
                    &Packet::Throw {
                        direction: Vector2::new(1.0, 0.0),
                        velocity: 20.0,
                        amount: None,
                    },
                )
                .await?;
                target = None;
            } else {
                position = at;
                send(
                    &socket,
                    args.server,
                    &Packet::UpdateUser {
                        position,
                        direction: Vector2::new(1.0, 0.0),
                    },
                )
                .await?;
                send(&socket, args.server, &Packet::Capture { npc_group_id: id }).await?;
                holding = true;
            }
        } else {
            send(&socket, args.server, &Packet::Heartbeat).await?;
        }

        sleep(Duration::from_millis(200)).await;
    }

    println!("Sending leave");
    send(&socket, args.server, &Packet::Leave).await?;
    Ok(())
}
