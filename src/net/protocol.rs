use crate::entities::container::{ContainerId, ContainerKind};
use crate::entities::creature::{Creature, CreatureId, CreatureImage, PlayerImage};
use crate::entities::item::ItemInstance;
use crate::net::packet::{PacketReader, PacketWriter};
use crate::world::coord::{Coord, Direction, SectorIndex};
use crate::world::sector::Tile;

pub const PROTOCOL_VERSION: &str = "tileworld-1";

const MAX_NAME_LEN: usize = 64;
const MAX_TEXT_LEN: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("frame truncated while reading {0}")]
    Truncated(&'static str),
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),
    #[error("unknown item source {0}")]
    BadSource(u8),
    #[error("unknown direction {0}")]
    BadDirection(u8),
    #[error("{0} unread bytes after command")]
    TrailingBytes(usize),
    #[error("frame of {0} bytes is too large")]
    FrameTooLarge(usize),
    #[error("empty frame")]
    EmptyFrame,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Where a client says an item lives, before it is resolved against the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemSource {
    /// Flat world index, see [`crate::world::coord::Geometry::index_from_coord`].
    World(u32),
    Container(ContainerId, u16),
    /// Bare hands; only meaningful as a tool.
    Hand,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatureSnapshot {
    pub id: CreatureId,
    pub name: String,
    pub image: CreatureImage,
    pub location: Coord,
}

impl From<&Creature> for CreatureSnapshot {
    fn from(creature: &Creature) -> Self {
        Self {
            id: creature.id,
            name: creature.name.clone(),
            image: creature.image,
            location: creature.location,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Initialize {
        version: String,
        world_name: String,
        size: i32,
        depth: i32,
        sector_size: i32,
    },
    Chat {
        text: String,
        location: Coord,
    },
    AddCreature(CreatureSnapshot),
    RemoveCreature {
        id: CreatureId,
    },
    MoveCreature {
        id: CreatureId,
        destination: Coord,
        duration_ms: u32,
        teleport: bool,
        on_raft: bool,
    },
    UpdateCreatureImage {
        id: CreatureId,
        image: CreatureImage,
    },
    UpdateTile {
        location: Coord,
        floor: u32,
        item: ItemInstance,
    },
    UpdateContainerSlot {
        container: ContainerId,
        index: u16,
        item: ItemInstance,
    },
    Container {
        id: ContainerId,
        kind: ContainerKind,
        items: Vec<ItemInstance>,
    },
    SectorData {
        index: SectorIndex,
        tiles: Vec<(u32, ItemInstance)>,
    },
    Animation {
        name: String,
        location: Coord,
    },
    /// Which creature the receiving client controls.
    SetFocus {
        id: CreatureId,
    },
}

impl ServerMessage {
    pub fn chat(text: impl Into<String>, location: Coord) -> Self {
        ServerMessage::Chat {
            text: text.into(),
            location,
        }
    }

    pub fn animation(name: impl Into<String>, location: Coord) -> Self {
        ServerMessage::Animation {
            name: name.into(),
            location,
        }
    }

    pub fn update_tile(location: Coord, tile: &Tile) -> Self {
        ServerMessage::UpdateTile {
            location,
            floor: tile.floor,
            item: tile.item,
        }
    }

    pub fn sector_data(index: SectorIndex, tiles: &[Tile]) -> Self {
        ServerMessage::SectorData {
            index,
            tiles: tiles.iter().map(|tile| (tile.floor, tile.item)).collect(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut writer = PacketWriter::with_capacity(32);
        match self {
            ServerMessage::Initialize {
                version,
                world_name,
                size,
                depth,
                sector_size,
            } => {
                writer.write_u8(0x01);
                writer.write_string(version);
                writer.write_string(world_name);
                writer.write_i32_le(*size);
                writer.write_i32_le(*depth);
                writer.write_i32_le(*sector_size);
            }
            ServerMessage::Chat { text, location } => {
                writer.write_u8(0x02);
                writer.write_string(text);
                write_coord(&mut writer, *location);
            }
            ServerMessage::AddCreature(snapshot) => {
                writer.write_u8(0x03);
                writer.write_u32_le(snapshot.id.0);
                writer.write_string(&snapshot.name);
                write_image(&mut writer, &snapshot.image);
                write_coord(&mut writer, snapshot.location);
            }
            ServerMessage::RemoveCreature { id } => {
                writer.write_u8(0x04);
                writer.write_u32_le(id.0);
            }
            ServerMessage::MoveCreature {
                id,
                destination,
                duration_ms,
                teleport,
                on_raft,
            } => {
                writer.write_u8(0x05);
                writer.write_u32_le(id.0);
                write_coord(&mut writer, *destination);
                writer.write_u32_le(*duration_ms);
                writer.write_bool(*teleport);
                writer.write_bool(*on_raft);
            }
            ServerMessage::UpdateCreatureImage { id, image } => {
                writer.write_u8(0x06);
                writer.write_u32_le(id.0);
                write_image(&mut writer, image);
            }
            ServerMessage::UpdateTile {
                location,
                floor,
                item,
            } => {
                writer.write_u8(0x07);
                write_coord(&mut writer, *location);
                writer.write_u32_le(*floor);
                write_item(&mut writer, item);
            }
            ServerMessage::UpdateContainerSlot {
                container,
                index,
                item,
            } => {
                writer.write_u8(0x08);
                writer.write_u32_le(container.0);
                writer.write_u16_le(*index);
                write_item(&mut writer, item);
            }
            ServerMessage::Container { id, kind, items } => {
                writer.write_u8(0x09);
                writer.write_u32_le(id.0);
                writer.write_u8(match kind {
                    ContainerKind::Inventory => 0,
                    ContainerKind::Equipment => 1,
                    ContainerKind::WorldDrop => 2,
                });
                writer.write_u16_le(items.len() as u16);
                for item in items {
                    write_item(&mut writer, item);
                }
            }
            ServerMessage::SectorData { index, tiles } => {
                writer.write_u8(0x0a);
                writer.write_i32_le(index.x);
                writer.write_i32_le(index.y);
                writer.write_i32_le(index.z);
                // Geometry caps a sector at MAX_SECTOR_SIZE squared tiles.
                writer.write_u16_le(u16::try_from(tiles.len()).unwrap_or(u16::MAX));
                for (floor, item) in tiles {
                    writer.write_u32_le(*floor);
                    write_item(&mut writer, item);
                }
            }
            ServerMessage::Animation { name, location } => {
                writer.write_u8(0x0b);
                writer.write_string(name);
                write_coord(&mut writer, *location);
            }
            ServerMessage::SetFocus { id } => {
                writer.write_u8(0x0c);
                writer.write_u32_le(id.0);
            }
        }
        writer.into_vec()
    }
}

fn write_coord(writer: &mut PacketWriter, coord: Coord) {
    writer.write_i32_le(coord.x);
    writer.write_i32_le(coord.y);
    writer.write_i32_le(coord.z);
}

fn write_item(writer: &mut PacketWriter, item: &ItemInstance) {
    writer.write_u32_le(item.item.0);
    writer.write_u32_le(item.quantity);
}

fn write_image(writer: &mut PacketWriter, image: &CreatureImage) {
    match image {
        CreatureImage::Fixed {
            image,
            width,
            height,
        } => {
            writer.write_u8(0);
            writer.write_u32_le(*image);
            writer.write_u8(*width);
            writer.write_u8(*height);
        }
        CreatureImage::Composable(PlayerImage {
            head,
            arms,
            chest,
            legs,
            shield,
            weapon,
            ..
        }) => {
            writer.write_u8(1);
            for part in [head, arms, chest, legs, shield, weapon] {
                writer.write_u32_le(*part);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Login {
        username: String,
        password: String,
    },
    Register {
        username: String,
        password: String,
    },
    Chat {
        text: String,
    },
    /// `destination` is the world index the use acts on; without one it
    /// acts on the focus tile, or the user's tile for a carried focus.
    UseItem {
        tool: ItemSource,
        focus: ItemSource,
        use_index: u16,
        destination: Option<u32>,
    },
    Equip {
        slot: u16,
    },
    Unequip {
        slot: u16,
    },
    Walk {
        direction: Direction,
    },
    MoveItem {
        from: ItemSource,
        to: ItemSource,
    },
    RequestSector {
        index: SectorIndex,
    },
    UnloadSector {
        index: SectorIndex,
    },
    OpenContainer {
        id: ContainerId,
    },
    CloseContainer {
        id: ContainerId,
    },
}

impl ClientCommand {
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = PacketReader::new(data);
        let opcode = reader.read_u8().ok_or(ProtocolError::EmptyFrame)?;
        let command = match opcode {
            0x01 | 0x02 => {
                let username = read_string(&mut reader, MAX_NAME_LEN, "username")?;
                let password = read_string(&mut reader, MAX_NAME_LEN, "password")?;
                if opcode == 0x01 {
                    ClientCommand::Login { username, password }
                } else {
                    ClientCommand::Register { username, password }
                }
            }
            0x03 => ClientCommand::Chat {
                text: read_string(&mut reader, MAX_TEXT_LEN, "chat text")?,
            },
            0x04 => ClientCommand::UseItem {
                tool: read_source(&mut reader)?,
                focus: read_source(&mut reader)?,
                use_index: read_u16(&mut reader, "use index")?,
                destination: match reader
                    .read_u8()
                    .ok_or(ProtocolError::Truncated("destination flag"))?
                {
                    0 => None,
                    _ => Some(read_u32(&mut reader, "destination index")?),
                },
            },
            0x05 => ClientCommand::Equip {
                slot: read_u16(&mut reader, "slot")?,
            },
            0x06 => ClientCommand::Unequip {
                slot: read_u16(&mut reader, "slot")?,
            },
            0x07 => {
                let code = reader
                    .read_u8()
                    .ok_or(ProtocolError::Truncated("direction"))?;
                ClientCommand::Walk {
                    direction: Direction::from_code(code)
                        .ok_or(ProtocolError::BadDirection(code))?,
                }
            }
            0x08 => ClientCommand::MoveItem {
                from: read_source(&mut reader)?,
                to: read_source(&mut reader)?,
            },
            0x09 => ClientCommand::RequestSector {
                index: read_sector(&mut reader)?,
            },
            0x0a => ClientCommand::UnloadSector {
                index: read_sector(&mut reader)?,
            },
            0x0b => ClientCommand::OpenContainer {
                id: ContainerId(read_u32(&mut reader, "container id")?),
            },
            0x0c => ClientCommand::CloseContainer {
                id: ContainerId(read_u32(&mut reader, "container id")?),
            },
            other => return Err(ProtocolError::UnknownOpcode(other)),
        };
        if reader.remaining() > 0 {
            return Err(ProtocolError::TrailingBytes(reader.remaining()));
        }
        Ok(command)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut writer = PacketWriter::new();
        match self {
            ClientCommand::Login { username, password } => {
                writer.write_u8(0x01);
                writer.write_string(username);
                writer.write_string(password);
            }
            ClientCommand::Register { username, password } => {
                writer.write_u8(0x02);
                writer.write_string(username);
                writer.write_string(password);
            }
            ClientCommand::Chat { text } => {
                writer.write_u8(0x03);
                writer.write_string(text);
            }
            ClientCommand::UseItem {
                tool,
                focus,
                use_index,
                destination,
            } => {
                writer.write_u8(0x04);
                write_source(&mut writer, *tool);
                write_source(&mut writer, *focus);
                writer.write_u16_le(*use_index);
                match destination {
                    Some(index) => {
                        writer.write_u8(1);
                        writer.write_u32_le(*index);
                    }
                    None => writer.write_u8(0),
                }
            }
            ClientCommand::Equip { slot } => {
                writer.write_u8(0x05);
                writer.write_u16_le(*slot);
            }
            ClientCommand::Unequip { slot } => {
                writer.write_u8(0x06);
                writer.write_u16_le(*slot);
            }
            ClientCommand::Walk { direction } => {
                writer.write_u8(0x07);
                writer.write_u8(direction.code());
            }
            ClientCommand::MoveItem { from, to } => {
                writer.write_u8(0x08);
                write_source(&mut writer, *from);
                write_source(&mut writer, *to);
            }
            ClientCommand::RequestSector { index } => {
                writer.write_u8(0x09);
                write_sector(&mut writer, *index);
            }
            ClientCommand::UnloadSector { index } => {
                writer.write_u8(0x0a);
                write_sector(&mut writer, *index);
            }
            ClientCommand::OpenContainer { id } => {
                writer.write_u8(0x0b);
                writer.write_u32_le(id.0);
            }
            ClientCommand::CloseContainer { id } => {
                writer.write_u8(0x0c);
                writer.write_u32_le(id.0);
            }
        }
        writer.into_vec()
    }
}

fn read_string(
    reader: &mut PacketReader<'_>,
    max_len: usize,
    field: &'static str,
) -> Result<String, ProtocolError> {
    reader
        .read_string(max_len)
        .ok_or(ProtocolError::Truncated(field))
}

fn read_u16(reader: &mut PacketReader<'_>, field: &'static str) -> Result<u16, ProtocolError> {
    reader.read_u16_le().ok_or(ProtocolError::Truncated(field))
}

fn read_u32(reader: &mut PacketReader<'_>, field: &'static str) -> Result<u32, ProtocolError> {
    reader.read_u32_le().ok_or(ProtocolError::Truncated(field))
}

fn read_sector(reader: &mut PacketReader<'_>) -> Result<SectorIndex, ProtocolError> {
    let mut axis = || reader.read_i32_le().ok_or(ProtocolError::Truncated("sector index"));
    Ok(SectorIndex::new(axis()?, axis()?, axis()?))
}

fn write_sector(writer: &mut PacketWriter, index: SectorIndex) {
    writer.write_i32_le(index.x);
    writer.write_i32_le(index.y);
    writer.write_i32_le(index.z);
}

fn read_source(reader: &mut PacketReader<'_>) -> Result<ItemSource, ProtocolError> {
    let tag = reader
        .read_u8()
        .ok_or(ProtocolError::Truncated("item source"))?;
    match tag {
        0 => Ok(ItemSource::World(read_u32(reader, "world index")?)),
        1 => {
            let id = ContainerId(read_u32(reader, "container id")?);
            let slot = read_u16(reader, "container slot")?;
            Ok(ItemSource::Container(id, slot))
        }
        2 => Ok(ItemSource::Hand),
        other => Err(ProtocolError::BadSource(other)),
    }
}

fn write_source(writer: &mut PacketWriter, source: ItemSource) {
    match source {
        ItemSource::World(index) => {
            writer.write_u8(0);
            writer.write_u32_le(index);
        }
        ItemSource::Container(id, slot) => {
            writer.write_u8(1);
            writer.write_u32_le(id.0);
            writer.write_u16_le(slot);
        }
        ItemSource::Hand => writer.write_u8(2),
    }
}
