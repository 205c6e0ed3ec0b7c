//! Server network layer handling UDP communications and game loop coordination

use crate::broadcast::Broadcaster;
use crate::client_manager::ClientManager;
use crate::config::GameConfig;
use crate::error::GameResult;
use crate::tick::run_tick;
use crate::utils::get_timestamp;
use crate::world::World;
use arena_shared::{decode_packet, encode_packet, Packet, UserId};
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ClientTimeout {
        user_id: UserId,
        room: Option<String>,
    },
    Shutdown,
}

/// Messages sent from game loop to network tasks
#[derive(Debug)]
pub enum GameMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
    SendToUser { user_id: UserId, packet: Packet },
    BroadcastPacket { room: String, packet: Packet },
}

/// Queues world events for the sender task.
#[derive(Debug, Clone)]
pub struct ChannelBroadcaster {
    game_tx: mpsc::UnboundedSender<GameMessage>,
}

impl ChannelBroadcaster {
    pub fn new(game_tx: mpsc::UnboundedSender<GameMessage>) -> Self {
        Self { game_tx }
    }

    fn queue(&self, message: GameMessage) {
        if let Err(e) = self.game_tx.send(message) {
            error!("Failed to queue outbound packet: {}", e);
        }
    }
}

impl Broadcaster for ChannelBroadcaster {
    fn emit_to_room(&self, room: &str, packet: &Packet) {
        self.queue(GameMessage::BroadcastPacket {
            room: room.to_string(),
            packet: packet.clone(),
        });
    }

    fn emit_to_user(&self, _room: &str, user_id: UserId, packet: &Packet) {
        self.queue(GameMessage::SendToUser {
            user_id,
            packet: packet.clone(),
        });
    }
}

/// Stops a running [`Server`] from another task.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    server_tx: mpsc::UnboundedSender<ServerMessage>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        if self.server_tx.send(ServerMessage::Shutdown).is_err() {
            debug!("Shutdown requested after server loop ended");
        }
    }
}

/// Main server coordinating networking and game simulation
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    world: World,
    broadcaster: ChannelBroadcaster,
    tick_duration: Duration,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_rx: Option<mpsc::UnboundedReceiver<GameMessage>>,
}

impl Server {
    pub async fn new(addr: &str, config: GameConfig) -> GameResult<Self> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(
                config.max_clients,
                config.client_timeout,
            ))),
            tick_duration: config.tick_duration(),
            world: World::new(config),
            broadcaster: ChannelBroadcaster::new(game_tx),
            server_tx,
            server_rx,
            game_rx: Some(game_rx),
        })
    }

    pub fn local_addr(&self) -> GameResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            server_tx: self.server_tx.clone(),
        }
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 8192];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match decode_packet(&buffer[..len]) {
                        Ok(packet) => {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        }
                        Err(e) => warn!("Failed to decode packet from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let Some(mut game_rx) = self.game_rx.take() else {
            return;
        };
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                let (packet, targets) = match message {
                    GameMessage::SendPacket { packet, addr } => (packet, vec![addr]),
                    GameMessage::SendToUser { user_id, packet } => {
                        let addr = clients.read().await.user_addr(user_id);
                        (packet, addr.into_iter().collect())
                    }
                    GameMessage::BroadcastPacket { room, packet } => {
                        let addrs = clients
                            .read()
                            .await
                            .room_addrs(&room)
                            .into_iter()
                            .map(|(_, addr)| addr)
                            .collect();
                        (packet, addrs)
                    }
                };

                if targets.is_empty() {
                    continue;
                }
                let data = match encode_packet(&packet) {
                    Ok(data) => data,
                    Err(e) => {
                        error!("Failed to encode {}: {}", packet.name(), e);
                        continue;
                    }
                };
                for addr in targets {
                    if let Err(e) = socket.send_to(&data, addr).await {
                        error!("Failed to send {} to {}: {}", packet.name(), addr, e);
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = clients.write().await.check_timeouts();

                for (user_id, room) in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { user_id, room }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        self.broadcaster.queue(GameMessage::SendPacket { packet, addr });
    }

    /// Processes incoming packets and updates the world
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        let now = get_timestamp();

        if let Packet::Join {
            room_hint,
            animal,
            nickname,
        } = packet
        {
            self.handle_join(addr, room_hint, animal, nickname, now)
                .await;
            return;
        }

        let Some((user_id, room)) = self.clients.write().await.touch_client(addr) else {
            debug!("Ignoring {} from unknown peer {}", packet.name(), addr);
            return;
        };
        let Some(room) = room else {
            return;
        };

        match packet {
            Packet::UpdateUser {
                position,
                direction,
            } => {
                self.world.update_user(
                    &room,
                    user_id,
                    position,
                    direction,
                    &self.broadcaster,
                    now,
                );
            }
            Packet::Capture { npc_group_id } => {
                self.world
                    .capture(&room, user_id, npc_group_id, &self.broadcaster, now);
            }
            Packet::Throw {
                direction,
                velocity,
                amount,
            } => {
                self.world.throw(
                    &room,
                    user_id,
                    direction,
                    velocity,
                    amount,
                    &self.broadcaster,
                    now,
                );
            }
            Packet::Heartbeat => {}
            Packet::Leave => {
                self.clients.write().await.remove_client(user_id);
                self.world.leave(&room, user_id, &self.broadcaster, now);
            }
            other => {
                warn!("Unexpected {} from client {} at {}", other.name(), user_id, addr);
            }
        }
    }

    async fn handle_join(
        &mut self,
        addr: SocketAddr,
        room_hint: Option<String>,
        animal: arena_shared::Animal,
        nickname: String,
        now: u64,
    ) {
        info!("Client joining from {} as {} ({:?})", addr, nickname, animal);

        // Rejoining from the same address replaces the old session
        let existing = self.clients.write().await.touch_client(addr);
        if let Some((existing_id, room)) = existing {
            info!("Removing existing client {} from {}", existing_id, addr);
            self.clients.write().await.remove_client(existing_id);
            if let Some(room) = room {
                self.world
                    .leave(&room, existing_id, &self.broadcaster, now);
            }
        }

        let user_id = self.world.allocate_user_id();
        if !self.clients.write().await.add_client(addr, user_id) {
            self.send_packet(
                Packet::Rejected {
                    reason: "Server full".to_string(),
                },
                addr,
            );
            return;
        }

        let joined = self.world.join(
            user_id,
            room_hint.as_deref(),
            animal,
            &nickname,
            &self.broadcaster,
            now,
        );
        match joined {
            Ok(user) => self.clients.write().await.set_room(user_id, &user.room),
            Err(e) => {
                warn!("Join from {} rejected: {}", addr, e);
                self.clients.write().await.remove_client(user_id);
                self.send_packet(
                    Packet::Rejected {
                        reason: e.to_string(),
                    },
                    addr,
                );
            }
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> GameResult<()> {
        // Initialize concurrent tasks
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut tick: u64 = 0;

        info!("Server started successfully");

        loop {
            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { user_id, room }) => {
                            info!("Client {} timed out", user_id);
                            if let Some(room) = room {
                                self.world.leave(&room, user_id, &self.broadcaster, get_timestamp());
                            }
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                // Handle server tick events
                _ = tick_interval.tick() => {
                    tick += 1;
                    let report = run_tick(&mut self.world, &self.broadcaster, get_timestamp());

                    // Periodic monitoring
                    if tick % 100 == 0 && report.rooms > 0 {
                        let client_count = self.clients.read().await.len();
                        debug!("Tick {}: {} clients, {:?}", tick, client_count, report);
                    }
                },
            }
        }

        Ok(())
    }
}
