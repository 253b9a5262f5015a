pub mod net;
pub mod player;
pub mod room;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use crate::player::{Player, PlayerId};
    use crate::room::{Room, RoomSettings};

    /// Create `n` test players with sequential IDs starting at 1, slots in
    /// join order and the first as host.
    pub fn make_players(n: usize) -> Vec<Player> {
        (0..n)
            .map(|i| {
                let mut p = Player::new(i as PlayerId + 1, format!("Player{}", i + 1), i as u8);
                p.is_host = i == 0;
                p
            })
            .collect()
    }

    /// Create a lobby room with `n` members (IDs 1..=n, host 1).
    pub fn make_room(code: &str, n: usize) -> Room {
        let mut room = Room::new(code.to_string(), 1, "Player1".into(), RoomSettings::default());
        for i in 1..n {
            let _ = room.add_player(i as PlayerId + 1, format!("Player{}", i + 1));
        }
        room
    }
}
