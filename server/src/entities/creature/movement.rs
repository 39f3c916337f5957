//! Creature movement and visibility updates.

use std::time::Duration;

use rand::Rng;

use realm_shared::{Direction, ObjectType, Point, ServerMessage, DATA_RANGE};

use super::Creature;
use crate::entities::MapObject;
use crate::world::GameWorld;

impl Creature {
    pub fn can_move(&self, world: &GameWorld) -> bool {
        world.now() >= self.state().move_time
    }

    /// Step one cell in `direction`.
    ///
    /// The move cooldown advances from its previous value rather than from
    /// now, so a late tick does not push back the next step.
    pub fn walk(&self, world: &GameWorld, direction: Direction) -> bool {
        let now = world.now();
        let (from, to) = {
            let mut state = self.state();
            if now < state.move_time {
                return false;
            }

            let from = state.point;
            let to = from.next_point(direction, 1);
            if !world.map().try_move_object(self.id, from, to) {
                return false;
            }

            let step = Duration::from_millis(state.move_speed);
            state.point = to;
            state.direction = direction;
            state.move_time += step;
            (from, to)
        };

        self.walk_notify(world, from, to);
        world.broadcast(to, &ServerMessage::ObjectWalk {
            object_id: self.id,
            location: to,
            direction,
        }, None);
        true
    }

    /// Tell players that came into or fell out of range about this creature
    fn walk_notify(&self, world: &GameWorld, from: Point, to: Point) {
        let diff = world.map().calc_diff(from, to, DATA_RANGE);
        if diff.added.is_empty() && diff.removed.is_empty() {
            return;
        }

        let appear = self.appearance();
        let remove = ServerMessage::ObjectRemove { object_id: self.id };
        let notify = |points: &[Point], msg: &ServerMessage| {
            for point in points {
                let Some(cell) = world.map().cell(*point) else {
                    continue;
                };
                for object in cell.objects() {
                    if object.race() == ObjectType::Player {
                        object.enqueue(msg);
                    }
                }
            }
        };
        notify(&diff.added, &appear);
        notify(&diff.removed, &remove);
    }

    /// Face `direction` without moving
    pub fn turn(&self, world: &GameWorld, direction: Direction) -> bool {
        let point = {
            let mut state = self.state();
            if world.now() < state.move_time {
                return false;
            }
            state.direction = direction;
            state.point
        };

        world.broadcast(point, &ServerMessage::ObjectTurn {
            object_id: self.id,
            location: point,
            direction,
        }, None);
        true
    }

    /// Take one step toward `dest`, sidestepping obstacles.
    ///
    /// Tries the direct direction first, then up to seven more rotated the
    /// same way around, clockwise or counter-clockwise at random.
    pub fn move_to(&self, world: &GameWorld, dest: Point) -> bool {
        let point = self.point();
        if point == dest {
            return false;
        }
        if point.in_range(dest, 1) {
            let open = world
                .map()
                .cell(dest)
                .is_some_and(|cell| cell.is_valid() && !cell.has_blocking(Some(self.id)));
            if !open {
                return false;
            }
        }

        let mut direction = Direction::from_points(point, dest);
        if self.walk(world, direction) {
            return true;
        }

        let clockwise = rand::thread_rng().gen_bool(0.5);
        for _ in 0..7 {
            direction = if clockwise { direction.next() } else { direction.previous() };
            if self.walk(world, direction) {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{GameDb, MonsterInfo};
    use crate::entities::ServerPlayer;
    use crate::world::tests::{drain, test_world};
    use std::sync::Arc;

    fn walker(move_speed: u64) -> MonsterInfo {
        let mut info = MonsterInfo::new("Hen", 10);
        info.ai = 3;
        info.move_speed = move_speed;
        info
    }

    #[test]
    fn test_walk_cooldown_is_drift_free() {
        let (world, clock) = test_world(GameDb::new());
        let hen = world.spawn_creature(&walker(600), Point::new(5, 5)).unwrap();
        let start = hen.snapshot().move_time;

        assert!(hen.walk(&world, Direction::Right));
        assert_eq!(hen.point(), Point::new(6, 5));
        assert_eq!(hen.snapshot().move_time, start + Duration::from_millis(600));
        assert!(!hen.can_move(&world));
        assert!(!hen.walk(&world, Direction::Right));

        // A tick arriving 250ms late
        clock.advance_ms(850);
        assert!(hen.walk(&world, Direction::Right));
        assert_eq!(hen.snapshot().move_time, start + Duration::from_millis(1_200));

        clock.advance_ms(350);
        assert!(hen.can_move(&world));
    }

    #[test]
    fn test_walk_blocked_by_occupant_and_walls() {
        let (world, _) = test_world(GameDb::new());
        let hen = world.spawn_creature(&walker(0), Point::new(0, 5)).unwrap();
        let rock = world.spawn_creature(&walker(0), Point::new(1, 5)).unwrap();

        assert!(!hen.walk(&world, Direction::Right));
        assert!(!hen.walk(&world, Direction::Left));
        assert_eq!(hen.point(), Point::new(0, 5));

        rock.die(&world);
        assert!(hen.walk(&world, Direction::Right));
        assert_eq!(hen.point(), Point::new(1, 5));
        assert_eq!(hen.direction(), Direction::Right);
    }

    #[test]
    fn test_walk_notifies_observers() {
        let (world, _) = test_world(GameDb::new());
        let hen = world.spawn_creature(&walker(0), Point::new(0, 0)).unwrap();

        let (near, mut near_rx) = ServerPlayer::new(world.new_object_id(), "Near", 100);
        world.add_player(Arc::new(near), Point::new(1, 1));
        let (edge, mut edge_rx) = ServerPlayer::new(world.new_object_id(), "Edge", 100);
        world.add_player(Arc::new(edge), Point::new(21, 0));
        drain(&mut near_rx);
        drain(&mut edge_rx);

        assert!(hen.walk(&world, Direction::Right));

        let near_msgs = drain(&mut near_rx);
        assert_eq!(near_msgs.len(), 1);
        assert!(matches!(near_msgs[0], ServerMessage::ObjectWalk { .. }));

        let edge_msgs = drain(&mut edge_rx);
        assert_eq!(edge_msgs.len(), 2);
        assert!(matches!(edge_msgs[0], ServerMessage::ObjectMonster { .. }));
        assert!(matches!(edge_msgs[1], ServerMessage::ObjectWalk { .. }));

        assert!(hen.walk(&world, Direction::Left));
        assert!(hen.walk(&world, Direction::Right));
        assert!(hen.walk(&world, Direction::Left));
        let edge_msgs = drain(&mut edge_rx);
        assert!(matches!(edge_msgs[0], ServerMessage::ObjectRemove { .. }));
    }

    #[test]
    fn test_two_walkers_never_share_a_cell() {
        use std::sync::Barrier;
        use std::thread;

        let target = Point::new(5, 5);
        for _ in 0..300 {
            let (world, _) = test_world(GameDb::new());
            let left = world.spawn_creature(&walker(0), Point::new(4, 5)).unwrap();
            let right = world.spawn_creature(&walker(0), Point::new(6, 5)).unwrap();

            let barrier = Barrier::new(2);
            let walked = thread::scope(|s| {
                let a = s.spawn(|| {
                    barrier.wait();
                    left.walk(&world, Direction::Right)
                });
                let b = s.spawn(|| {
                    barrier.wait();
                    right.walk(&world, Direction::Left)
                });
                [a.join().unwrap(), b.join().unwrap()]
            });

            assert_eq!(walked.iter().filter(|w| **w).count(), 1);
            let occupants = world.map().cell(target).unwrap().objects();
            assert_eq!(occupants.len(), 1);
            assert_eq!(occupants[0].point(), target);
        }
    }

    #[test]
    fn test_turn_respects_move_cooldown() {
        let (world, clock) = test_world(GameDb::new());
        let hen = world.spawn_creature(&walker(500), Point::new(5, 5)).unwrap();

        assert!(hen.turn(&world, Direction::Left));
        assert_eq!(hen.direction(), Direction::Left);
        assert!(hen.walk(&world, Direction::Down));
        assert!(!hen.turn(&world, Direction::Up));
        clock.advance_ms(500);
        assert!(hen.turn(&world, Direction::Up));
    }

    #[test]
    fn test_move_to_sidesteps_obstacle() {
        let (world, _) = test_world(GameDb::new());
        let hen = world.spawn_creature(&walker(0), Point::new(5, 5)).unwrap();
        world.spawn_creature(&walker(0), Point::new(6, 5)).unwrap();

        assert!(hen.move_to(&world, Point::new(9, 5)));
        let point = hen.point();
        assert_ne!(point, Point::new(5, 5));
        assert_ne!(point, Point::new(6, 5));
        assert!(point.in_range(Point::new(5, 5), 1));
    }

    #[test]
    fn test_move_to_adjacent_blocked_is_noop() {
        let (world, _) = test_world(GameDb::new());
        let hen = world.spawn_creature(&walker(0), Point::new(5, 5)).unwrap();
        world.spawn_creature(&walker(0), Point::new(6, 5)).unwrap();

        assert!(!hen.move_to(&world, Point::new(6, 5)));
        assert!(!hen.move_to(&world, Point::new(5, 5)));
        assert_eq!(hen.point(), Point::new(5, 5));
    }

    #[test]
    fn test_move_to_gives_up_when_boxed_in() {
        let (world, _) = test_world(GameDb::new());
        let hen = world.spawn_creature(&walker(0), Point::new(5, 5)).unwrap();
        for direction in Direction::ALL {
            world
                .spawn_creature(&walker(0), Point::new(5, 5).next_point(direction, 1))
                .unwrap();
        }

        assert!(!hen.move_to(&world, Point::new(10, 10)));
        assert_eq!(hen.point(), Point::new(5, 5));
    }
}
