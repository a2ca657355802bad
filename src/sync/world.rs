//! Read-only view of the hosting server for one tick

use rustc_hash::FxHashSet;

use crate::net::ClientId;
use crate::util::vec3::Vec3;

/// A client connected to the server
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectedClient {
    pub id: ClientId,
    pub name: String,
    pub dimension: i32,
    pub position: Vec3,
}

impl ConnectedClient {
    pub fn new(id: ClientId, name: impl Into<String>, dimension: i32, position: Vec3) -> Self {
        Self {
            id,
            name: name.into(),
            dimension,
            position,
        }
    }
}

/// Connected roster and loaded dimensions, captured by the tick driver
#[derive(Debug, Clone, Default)]
pub struct WorldSnapshot {
    pub clients: Vec<ConnectedClient>,
    pub loaded_dimensions: FxHashSet<i32>,
}

impl WorldSnapshot {
    pub fn new(clients: Vec<ConnectedClient>, loaded_dimensions: impl IntoIterator<Item = i32>) -> Self {
        Self {
            clients,
            loaded_dimensions: loaded_dimensions.into_iter().collect(),
        }
    }

    pub fn is_dimension_loaded(&self, dimension: i32) -> bool {
        self.loaded_dimensions.contains(&dimension)
    }

    /// Clients currently in `dimension`
    pub fn clients_in(&self, dimension: i32) -> impl Iterator<Item = &ConnectedClient> {
        self.clients.iter().filter(move |c| c.dimension == dimension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_clients_in_dimension() {
        let world = WorldSnapshot::new(
            vec![
                ConnectedClient::new(Uuid::new_v4(), "a", 0, Vec3::ZERO),
                ConnectedClient::new(Uuid::new_v4(), "b", -1, Vec3::ZERO),
                ConnectedClient::new(Uuid::new_v4(), "c", 0, Vec3::ZERO),
            ],
            [0],
        );
        assert_eq!(world.clients_in(0).count(), 2);
        assert!(world.is_dimension_loaded(0));
        assert!(!world.is_dimension_loaded(-1));
    }
}
