//! Constant-velocity Kalman filter, Rauch-Tung-Striebel smoother and EM
//! parameter fitting.
//!
//! State is `[lat, lon, v_lat, v_lon]`, observations are `[lat, lon]`.
//! Transition and observation models are fixed; EM fits the transition and
//! observation covariances plus the initial state distribution.

use crate::{Result, TripError};
use nalgebra::{SMatrix, SVector};

pub const STATE_DIM: usize = 4;
pub const OBS_DIM: usize = 2;

pub type StateVec = SVector<f64, STATE_DIM>;
pub type StateMat = SMatrix<f64, STATE_DIM, STATE_DIM>;
pub type ObsVec = SVector<f64, OBS_DIM>;
pub type ObsMat = SMatrix<f64, OBS_DIM, OBS_DIM>;
pub type ObsModel = SMatrix<f64, OBS_DIM, STATE_DIM>;
pub type KalmanGain = SMatrix<f64, STATE_DIM, OBS_DIM>;

/// Linear-Gaussian model parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct KalmanParams {
    pub transition: StateMat,
    pub observation: ObsModel,
    pub transition_cov: StateMat,
    pub observation_cov: ObsMat,
    pub initial_mean: StateVec,
    pub initial_cov: StateMat,
}

impl KalmanParams {
    /// Constant-velocity model with step `dt`.
    ///
    /// Covariances start at identity and the initial state sits at
    /// `initial_position` with zero velocity; EM refines them.
    pub fn constant_velocity(dt: f64, initial_position: ObsVec) -> Self {
        let mut transition = StateMat::identity();
        transition[(0, 2)] = dt;
        transition[(1, 3)] = dt;

        let mut observation = ObsModel::zeros();
        observation[(0, 0)] = 1.0;
        observation[(1, 1)] = 1.0;

        Self {
            transition,
            observation,
            transition_cov: StateMat::identity(),
            observation_cov: ObsMat::identity(),
            initial_mean: StateVec::new(initial_position[0], initial_position[1], 0.0, 0.0),
            initial_cov: StateMat::identity(),
        }
    }
}

/// Output of a forward filtering pass.
#[derive(Debug, Clone)]
pub struct FilterPass {
    pub predicted_means: Vec<StateVec>,
    pub predicted_covs: Vec<StateMat>,
    pub filtered_means: Vec<StateVec>,
    pub filtered_covs: Vec<StateMat>,
}

/// Smoothed state moments.
#[derive(Debug, Clone)]
pub struct SmoothedStates {
    pub means: Vec<StateVec>,
    pub covs: Vec<StateMat>,
    /// `Cov(x[t], x[t-1])`; index 0 is unused and zero.
    pub pairwise_covs: Vec<StateMat>,
}

/// Forward Kalman filter.
pub fn filter(observations: &[ObsVec], params: &KalmanParams) -> Result<FilterPass> {
    let n = observations.len();
    let mut pass = FilterPass {
        predicted_means: Vec::with_capacity(n),
        predicted_covs: Vec::with_capacity(n),
        filtered_means: Vec::with_capacity(n),
        filtered_covs: Vec::with_capacity(n),
    };
    let f = &params.transition;
    let h = &params.observation;

    for (t, y) in observations.iter().enumerate() {
        let (pred_mean, pred_cov) = if t == 0 {
            (params.initial_mean, params.initial_cov)
        } else {
            let m = pass.filtered_means[t - 1];
            let p = pass.filtered_covs[t - 1];
            (f * m, f * p * f.transpose() + params.transition_cov)
        };

        let innovation = y - h * pred_mean;
        let innovation_cov: ObsMat = h * pred_cov * h.transpose() + params.observation_cov;
        let inv = innovation_cov
            .try_inverse()
            .ok_or_else(|| TripError::numerical(format!("singular innovation covariance at {t}")))?;
        let gain: KalmanGain = pred_cov * h.transpose() * inv;

        let mean = pred_mean + gain * innovation;
        let cov = (StateMat::identity() - gain * h) * pred_cov;

        pass.predicted_means.push(pred_mean);
        pass.predicted_covs.push(pred_cov);
        pass.filtered_means.push(mean);
        pass.filtered_covs.push(symmetrize(&cov));
    }
    Ok(pass)
}

/// Rauch-Tung-Striebel smoother over a forward pass.
pub fn smooth_pass(pass: &FilterPass, params: &KalmanParams) -> Result<SmoothedStates> {
    let n = pass.filtered_means.len();
    if n == 0 {
        return Ok(SmoothedStates {
            means: Vec::new(),
            covs: Vec::new(),
            pairwise_covs: Vec::new(),
        });
    }
    let f = &params.transition;

    let mut means = pass.filtered_means.clone();
    let mut covs = pass.filtered_covs.clone();
    let mut gains = vec![StateMat::zeros(); n];

    for t in (0..n - 1).rev() {
        let pred_inv = pass.predicted_covs[t + 1]
            .try_inverse()
            .ok_or_else(|| TripError::numerical(format!("singular predicted covariance at {t}")))?;
        let j = pass.filtered_covs[t] * f.transpose() * pred_inv;
        means[t] = pass.filtered_means[t] + j * (means[t + 1] - pass.predicted_means[t + 1]);
        covs[t] = symmetrize(
            &(pass.filtered_covs[t] + j * (covs[t + 1] - pass.predicted_covs[t + 1]) * j.transpose()),
        );
        gains[t] = j;
    }

    let mut pairwise_covs = vec![StateMat::zeros(); n];
    for t in 1..n {
        pairwise_covs[t] = covs[t] * gains[t - 1].transpose();
    }

    Ok(SmoothedStates {
        means,
        covs,
        pairwise_covs,
    })
}

/// Filter then smooth.
pub fn rts_smooth(observations: &[ObsVec], params: &KalmanParams) -> Result<SmoothedStates> {
    let pass = filter(observations, params)?;
    smooth_pass(&pass, params)
}

/// Fit covariances and initial state with `n_iter` EM iterations.
pub fn em(observations: &[ObsVec], params: &KalmanParams, n_iter: usize) -> Result<KalmanParams> {
    let mut params = params.clone();
    let n = observations.len();
    if n < 2 {
        return Ok(params);
    }

    for _ in 0..n_iter {
        let states = rts_smooth(observations, &params)?;
        let f = params.transition;
        let h = params.observation;

        let mut obs_cov = ObsMat::zeros();
        for (t, y) in observations.iter().enumerate() {
            let residual = y - h * states.means[t];
            obs_cov += residual * residual.transpose() + h * states.covs[t] * h.transpose();
        }
        obs_cov /= n as f64;

        let mut trans_cov = StateMat::zeros();
        for t in 0..n - 1 {
            let err = states.means[t + 1] - f * states.means[t];
            let cross = states.pairwise_covs[t + 1] * f.transpose();
            trans_cov += err * err.transpose() + f * states.covs[t] * f.transpose()
                + states.covs[t + 1]
                - cross
                - cross.transpose();
        }
        trans_cov /= (n - 1) as f64;

        params.observation_cov = symmetrize(&obs_cov);
        params.transition_cov = symmetrize(&trans_cov);
        params.initial_mean = states.means[0];
        params.initial_cov = symmetrize(&states.covs[0]);

        if !is_finite(&params) {
            return Err(TripError::numerical("EM produced non-finite parameters"));
        }
    }
    Ok(params)
}

fn symmetrize<const D: usize>(m: &SMatrix<f64, D, D>) -> SMatrix<f64, D, D> {
    (m + m.transpose()) * 0.5
}

fn is_finite(params: &KalmanParams) -> bool {
    params.transition_cov.iter().all(|v| v.is_finite())
        && params.observation_cov.iter().all(|v| v.is_finite())
        && params.initial_mean.iter().all(|v| v.is_finite())
        && params.initial_cov.iter().all(|v| v.is_finite())
}
