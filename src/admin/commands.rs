use crate::entities::item::ItemId;
use crate::world::coord::Coord;

pub const INVALID_COMMAND: &str = "Invalid command.";
pub const INVALID_QUANTITY: &str = "Invalid quantity.";

/// Largest fixed image number `!image` accepts.
pub const MAX_IMAGE: u32 = 700;
/// Largest fixed image footprint, in tiles per side.
pub const MAX_IMAGE_SPAN: u8 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemSpec {
    Id(ItemId),
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Location,
    Online,
    Warp { destination: Coord },
    Teleport { target: String },
    Die,
    Kill,
    /// Image 0 switches back to the composable player image.
    Image { image: u32, width: u8, height: u8 },
    Save,
    Item { item: ItemSpec, quantity: u32 },
    Delete,
    Clear,
    Monster { id: u32 },
    Friendly { id: u32, message: String },
    Admin { target: String },
}

impl ChatCommand {
    pub fn requires_admin(&self) -> bool {
        matches!(
            self,
            ChatCommand::Save
                | ChatCommand::Item { .. }
                | ChatCommand::Delete
                | ChatCommand::Clear
                | ChatCommand::Monster { .. }
                | ChatCommand::Friendly { .. }
                | ChatCommand::Admin { .. }
        )
    }
}

/// `Ok(None)` for ordinary chat. The error text is shown to the player as is.
pub fn parse_command(message: &str) -> Result<Option<ChatCommand>, String> {
    let trimmed = message.trim();
    let Some(body) = trimmed.strip_prefix('!') else {
        return Ok(None);
    };

    let (command, rest) = match body.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (body, ""),
    };
    let mut parts = rest.split_whitespace();
    let parsed = match command.to_ascii_lowercase().as_str() {
        "loc" => ChatCommand::Location,
        "online" => ChatCommand::Online,
        "warp" => {
            let x = parse_number(parts.next())?;
            let y = parse_number(parts.next())?;
            let z = parse_number(parts.next())?;
            ChatCommand::Warp {
                destination: Coord::new(x, y, z),
            }
        }
        "tp" => ChatCommand::Teleport {
            target: required(parts.next())?.to_string(),
        },
        "die" => ChatCommand::Die,
        "kill" => ChatCommand::Kill,
        "image" => parse_image(&mut parts)?,
        "save" => ChatCommand::Save,
        "item" => parse_item(rest)?,
        "del" => ChatCommand::Delete,
        "clr" => ChatCommand::Clear,
        "monster" => ChatCommand::Monster {
            id: parse_number(parts.next())?,
        },
        "friendly" => {
            let id = parse_number(parts.next())?;
            let message = rest
                .split_once(char::is_whitespace)
                .map(|(_, message)| message.trim().to_string())
                .filter(|message| !message.is_empty())
                .ok_or_else(|| INVALID_COMMAND.to_string())?;
            ChatCommand::Friendly { id, message }
        }
        "admin" => ChatCommand::Admin {
            target: required(parts.next())?.to_string(),
        },
        _ => return Err(INVALID_COMMAND.to_string()),
    };
    Ok(Some(parsed))
}

fn parse_image<'a>(parts: &mut impl Iterator<Item = &'a str>) -> Result<ChatCommand, String> {
    let image: u32 = parse_number(parts.next())?;
    let (width, height) = match (parts.next(), parts.next()) {
        (None, _) => (1, 1),
        (Some(width), height) => (parse_number(Some(width))?, parse_number(height)?),
    };
    let span = 1..=MAX_IMAGE_SPAN;
    if image > MAX_IMAGE || !span.contains(&width) || !span.contains(&height) {
        return Err(INVALID_COMMAND.to_string());
    }
    Ok(ChatCommand::Image {
        image,
        width,
        height,
    })
}

/// `<id or name>[,quantity]`
fn parse_item(rest: &str) -> Result<ChatCommand, String> {
    let (item, quantity) = match rest.split_once(',') {
        Some((item, quantity)) => {
            let quantity = quantity
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|quantity| *quantity > 0)
                .ok_or_else(|| INVALID_QUANTITY.to_string())?;
            (item.trim(), quantity)
        }
        None => (rest, 1),
    };
    if item.is_empty() {
        return Err(INVALID_COMMAND.to_string());
    }
    let item = match item.parse::<u32>() {
        Ok(id) => ItemSpec::Id(ItemId(id)),
        Err(_) => ItemSpec::Name(item.to_string()),
    };
    Ok(ChatCommand::Item { item, quantity })
}

fn required(value: Option<&str>) -> Result<&str, String> {
    value.ok_or_else(|| INVALID_COMMAND.to_string())
}

fn parse_number<T: std::str::FromStr>(value: Option<&str>) -> Result<T, String> {
    required(value)?
        .parse::<T>()
        .map_err(|_| INVALID_COMMAND.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_not_a_command() {
        assert_eq!(parse_command("hello there").unwrap(), None);
    }

    #[test]
    fn parses_warp_coordinates() {
        assert_eq!(
            parse_command("!warp 10 -2 0").unwrap(),
            Some(ChatCommand::Warp {
                destination: Coord::new(10, -2, 0)
            })
        );
        assert_eq!(parse_command("!warp 10 2").unwrap_err(), INVALID_COMMAND);
    }

    #[test]
    fn parses_item_by_id_or_name() {
        assert_eq!(
            parse_command("!item 12,30").unwrap(),
            Some(ChatCommand::Item {
                item: ItemSpec::Id(ItemId(12)),
                quantity: 30
            })
        );
        assert_eq!(
            parse_command("!item gold coin").unwrap(),
            Some(ChatCommand::Item {
                item: ItemSpec::Name("gold coin".to_string()),
                quantity: 1
            })
        );
        assert_eq!(parse_command("!item 12,many").unwrap_err(), INVALID_QUANTITY);
        assert_eq!(parse_command("!item 12,0").unwrap_err(), INVALID_QUANTITY);
    }

    #[test]
    fn image_limits() {
        assert_eq!(
            parse_command("!image 0").unwrap(),
            Some(ChatCommand::Image {
                image: 0,
                width: 1,
                height: 1
            })
        );
        assert_eq!(
            parse_command("!image 700 3 2").unwrap(),
            Some(ChatCommand::Image {
                image: 700,
                width: 3,
                height: 2
            })
        );
        assert!(parse_command("!image 701").is_err());
        assert!(parse_command("!image 5 4 1").is_err());
        assert!(parse_command("!image 5 2").is_err());
    }

    #[test]
    fn friendly_keeps_the_whole_message() {
        assert_eq!(
            parse_command("!friendly 3 Welcome to  town!").unwrap(),
            Some(ChatCommand::Friendly {
                id: 3,
                message: "Welcome to  town!".to_string()
            })
        );
        assert!(parse_command("!friendly 3").is_err());
    }

    #[test]
    fn unknown_commands_are_invalid() {
        assert_eq!(parse_command("!fly").unwrap_err(), INVALID_COMMAND);
        assert_eq!(parse_command("!").unwrap_err(), INVALID_COMMAND);
    }

    #[test]
    fn admin_only_commands() {
        assert!(parse_command("!save").unwrap().unwrap().requires_admin());
        assert!(parse_command("!clr").unwrap().unwrap().requires_admin());
        assert!(!parse_command("!loc").unwrap().unwrap().requires_admin());
        assert!(!parse_command("!tp bob").unwrap().unwrap().requires_admin());
    }
}
