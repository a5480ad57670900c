use super::entity::{UserId, Vote};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    NoVotes,
    /// Several targets share the top count
    Tie(Vec<UserId>),
    Lynch(UserId),
}

/// Vote counts per target, in the order each target first received a vote
fn count_votes(votes: &[Vote]) -> Vec<(UserId, usize)> {
    let mut counts: Vec<(UserId, usize)> = Vec::new();

    for vote in votes {
        match counts.iter_mut().find(|(target, _)| *target == vote.target) {
            Some((_, count)) => *count += 1,
            None => counts.push((vote.target, 1)),
        }
    }

    counts
}

/// Most voted target; ties go to the target voted first
pub fn majority_target(votes: &[Vote]) -> Option<UserId> {
    count_votes(votes)
        .into_iter()
        .fold(None, |best: Option<(UserId, usize)>, (target, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((target, count)),
        })
        .map(|(target, _)| target)
}

pub fn tally_votes(votes: &[Vote]) -> VoteOutcome {
    let counts = count_votes(votes);

    let Some(top) = counts.iter().map(|(_, c)| *c).max() else {
        return VoteOutcome::NoVotes;
    };

    let leaders: Vec<UserId> = counts
        .iter()
        .filter(|(_, c)| *c == top)
        .map(|(t, _)| *t)
        .collect();

    match leaders.as_slice() {
        [single] => VoteOutcome::Lynch(*single),
        _ => VoteOutcome::Tie(leaders),
    }
}
