//! The simulation step: advances a running room by exactly one tick.
//!
//! Movement is resolved in three passes so that the order of players never
//! decides who survives:
//!
//! 1. **Plan**: every living snake picks its heading and next head cell.
//! 2. **Judge**: each plan is tested against the walls and against the
//!    bodies and planned heads *as they were before anyone moved*.
//! 3. **Apply**: deaths, food, and movement are written back.

use rand::Rng;
use snakepit_protocol::{Direction, Position};

use crate::state::{Outcome, Room, Scheduled};

#[derive(Debug, Clone, Copy)]
struct Plan {
    direction: Direction,
    head: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cause {
    Wall,
    Snake,
}

#[derive(Debug, Clone, Copy)]
enum Fate {
    /// Dead before this tick.
    Idle,
    Dies(Cause),
    Moves(Position),
}

impl Room {
    /// Advances the room by one tick. Does nothing unless running.
    ///
    /// The returned outcome carries `gameOver` when the run ended, or a
    /// `gameUpdate` snapshot when anything visible changed.
    pub fn tick(&mut self) -> Outcome {
        let mut outcome = Outcome::default();
        if !self.phase.is_running() {
            return outcome;
        }

        self.ticks_since_start += 1;

        if self.food.len() < self.config.max_food
            && self.rng.random_bool(self.config.food_spawn_chance)
            && self.spawn_food()
        {
            self.dirty = true;
        }

        let past_grace = self.ticks_since_start > self.config.grace_ticks();
        if past_grace && self.players.len() > 1 {
            let alive = self.players.iter().filter(|p| p.snake.alive).count();
            if alive <= 1 {
                self.end_game(&mut outcome);
                return outcome;
            }
        }

        let plans = self.plan_moves();
        let fates: Vec<Fate> = (0..plans.len())
            .map(|i| self.judge(i, &plans, past_grace))
            .collect();
        self.apply(&plans, &fates, &mut outcome);

        if let Some(update) = self.flush_update() {
            outcome.broadcast(update);
        }
        outcome
    }

    fn plan_moves(&self) -> Vec<Option<Plan>> {
        self.players
            .iter()
            .map(|player| {
                let snake = &player.snake;
                if !snake.alive {
                    return None;
                }
                let direction = if snake.pending_direction.is_reverse_of(snake.direction) {
                    snake.direction
                } else {
                    snake.pending_direction
                };
                Some(Plan {
                    direction,
                    head: snake.head().step(direction),
                })
            })
            .collect()
    }

    fn judge(&self, index: usize, plans: &[Option<Plan>], past_grace: bool) -> Fate {
        let Some(plan) = plans[index] else {
            return Fate::Idle;
        };
        let head = plan.head;
        if !head.in_bounds() {
            return Fate::Dies(Cause::Wall);
        }
        if !past_grace {
            return Fate::Moves(head);
        }

        let eats = self.food.iter().any(|f| f.position == head);
        for (other_index, other) in self.players.iter().enumerate() {
            let body = &other.snake;
            if !body.alive {
                continue;
            }
            if other_index == index {
                if !body.has_moved_since_start {
                    continue;
                }
                // The tail cell is free this tick unless the snake grows.
                let solid = if eats { body.len() } else { body.len().saturating_sub(1) };
                if body.body.iter().take(solid).any(|&cell| cell == head) {
                    return Fate::Dies(Cause::Snake);
                }
            } else if body.occupies(head)
                || plans[other_index].is_some_and(|p| p.head == head)
            {
                return Fate::Dies(Cause::Snake);
            }
        }
        Fate::Moves(head)
    }

    fn apply(&mut self, plans: &[Option<Plan>], fates: &[Fate], outcome: &mut Outcome) {
        let generation = self.generation;
        let replenish_after = self.config.replenish_delay;
        let food_score = self.config.food_score;

        for (index, fate) in fates.iter().enumerate() {
            let Some(plan) = plans[index] else {
                continue;
            };
            let player = &mut self.players[index];
            let snake = &mut player.snake;

            if snake.direction != plan.direction {
                snake.direction = plan.direction;
                self.dirty = true;
            }
            snake.pending_direction = plan.direction;

            match *fate {
                Fate::Idle => {}
                Fate::Dies(cause) => {
                    snake.alive = false;
                    self.dirty = true;
                    tracing::info!(
                        room_id = %self.id,
                        player_id = %player.id,
                        ?cause,
                        tick = self.ticks_since_start,
                        "snake died"
                    );
                }
                Fate::Moves(head) => {
                    let eaten = self.food.iter().position(|f| f.position == head);
                    snake.body.push_front(head);
                    match eaten {
                        Some(food_index) => {
                            self.food.remove(food_index);
                            snake.score += food_score;
                            outcome.scheduled.push(Scheduled::ReplenishFood {
                                generation,
                                after: replenish_after,
                            });
                            tracing::info!(
                                room_id = %self.id,
                                player_id = %player.id,
                                score = snake.score,
                                "food eaten"
                            );
                        }
                        None => {
                            snake.body.pop_back();
                        }
                    }
                    self.dirty = true;
                }
            }
        }
    }
}
