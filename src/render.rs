use crate::classify::{RouteRole, ScoredRoute};

/// A classified route with its position in the back-to-front draw sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRoute {
    pub scored: ScoredRoute,
    pub draw_order_index: usize,
}

fn draw_priority(role: RouteRole) -> u8 {
    match role {
        RouteRole::Standard => 0,
        RouteRole::Fastest => 1,
        RouteRole::Safest => 2,
    }
}

/// Orders routes back-to-front: `Standard`, then `Fastest`, then `Safest` on
/// top. The sort is stable, so routes sharing a role keep their input order.
pub fn plan_draw_order(routes: Vec<ScoredRoute>) -> Vec<PlannedRoute> {
    let mut routes = routes;
    routes.sort_by_key(|r| draw_priority(r.role));
    routes
        .into_iter()
        .enumerate()
        .map(|(draw_order_index, scored)| PlannedRoute {
            scored,
            draw_order_index,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::{CandidateRoute, Polyline};
    use crate::scoring::RiskAssessment;

    fn scored(id: &str, role: RouteRole) -> ScoredRoute {
        ScoredRoute {
            route: CandidateRoute::new(id, Polyline::default(), 1.0, 1.0),
            risk: RiskAssessment::default(),
            role,
        }
    }

    #[test]
    fn safest_is_drawn_last_and_standard_first() {
        let plan = plan_draw_order(vec![
            scored("safe", RouteRole::Safest),
            scored("s1", RouteRole::Standard),
            scored("fast", RouteRole::Fastest),
            scored("s2", RouteRole::Standard),
        ]);
        let order: Vec<(&str, usize)> = plan
            .iter()
            .map(|p| (p.scored.route.id.as_str(), p.draw_order_index))
            .collect();
        assert_eq!(
            order,
            vec![("s1", 0), ("s2", 1), ("fast", 2), ("safe", 3)]
        );
    }

    #[test]
    fn safest_index_exceeds_every_standard_index() {
        let plan = plan_draw_order(vec![
            scored("a", RouteRole::Standard),
            scored("b", RouteRole::Safest),
            scored("c", RouteRole::Standard),
        ]);
        let safest = plan
            .iter()
            .find(|p| p.scored.role == RouteRole::Safest)
            .map(|p| p.draw_order_index)
            .unwrap();
        assert!(
            plan.iter()
                .filter(|p| p.scored.role == RouteRole::Standard)
                .all(|p| p.draw_order_index < safest)
        );
    }

    #[test]
    fn empty_batch_plans_nothing() {
        assert!(plan_draw_order(Vec::new()).is_empty());
    }
}
